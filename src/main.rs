use std::path::{Path, PathBuf};

use anyhow::bail;
use clap::Parser;
use course_enrollment::{
    applications::{Applicant, ApplicationForm, ApplicationRepository, ApplicationStatus},
    catalog::{Catalog, CatalogCourse},
    config::Config,
    enrollment::{CourseStatus, EnrollOutcome, EnrolledCourse, EnrollmentStore},
    storage::FileStorage,
    utils::init_log,
};
use tracing::info;

#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to a TOML config file, falls back to $ENROLLMENT_CONFIG
    #[arg(short, long)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, clap::Subcommand)]
enum Commands {
    Catalog {
        #[command(subcommand)]
        command: CatalogCommand,
    },
    #[command(flatten)]
    Enrollment(EnrollmentCommand),
    Applications {
        #[command(subcommand)]
        command: ApplicationCommand,
    },
}

#[derive(Debug, clap::Subcommand)]
enum EnrollmentCommand {
    Enroll {
        course_id: String,
    },
    Unenroll {
        course_id: String,
    },
    /// Record progress (0-100) and completed lessons
    Progress {
        course_id: String,
        progress: u32,
        completed_lessons: u32,
    },
    Complete {
        course_id: String,
    },
    List {
        /// not_started, in_progress or completed
        #[arg(short, long)]
        status: Option<String>,
    },
    Stats,
}

#[derive(Debug, clap::Subcommand)]
enum CatalogCommand {
    List,
    Search {
        query: String,
    },
    Show {
        id: String,
    },
    Featured {
        #[arg(short, long, default_value = "3")]
        limit: usize,
    },
    Popular {
        #[arg(short, long, default_value = "3")]
        limit: usize,
    },
    Related {
        id: String,
        #[arg(short, long, default_value = "3")]
        limit: usize,
    },
}

#[derive(Debug, clap::Subcommand)]
enum ApplicationCommand {
    Submit {
        #[arg(short, long)]
        user_id: String,
        #[arg(short, long)]
        name: String,
        #[arg(short, long)]
        email: String,
        #[arg(long)]
        expertise: String,
        #[arg(long, default_value = "")]
        bio: String,
        #[arg(long)]
        verified: bool,
    },
    List {
        /// Pending, Approved or Rejected
        #[arg(short, long)]
        status: Option<String>,
    },
    Approve {
        id: i64,
    },
    Reject {
        id: i64,
        reason: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Cli::parse();
    let config = Config::load(args.config.as_deref())?;
    let _guard = init_log(config.log_dir.clone())?;
    info!("using storage {}", config.storage_dir.display());

    match args.command {
        Commands::Catalog { command } => run_catalog(&config, command),
        Commands::Applications { command } => run_applications(&config, command).await,
        Commands::Enrollment(command) => run_enrollment(&config, command),
    }
}

fn run_catalog(config: &Config, command: CatalogCommand) -> anyhow::Result<()> {
    let catalog = Catalog::load(&config.catalog_path)?;
    let courses = match command {
        CatalogCommand::List => catalog.courses().iter().collect(),
        CatalogCommand::Search { query } => catalog.search(&query),
        CatalogCommand::Show { id } => {
            let course = catalog.get(&id)?;
            println!("{}", serde_json::to_string_pretty(course)?);
            if let Some(range) = course.duration_range() {
                println!("duration: {range}");
            }
            return Ok(());
        }
        CatalogCommand::Featured { limit } => catalog.featured(limit),
        CatalogCommand::Popular { limit } => catalog.popular(limit),
        CatalogCommand::Related { id, limit } => catalog.related(&id, limit),
    };
    for course in courses {
        print_catalog_course(course);
    }
    Ok(())
}

fn run_enrollment(config: &Config, command: EnrollmentCommand) -> anyhow::Result<()> {
    let storage = FileStorage::new(&config.storage_dir)?;
    let mut store = EnrollmentStore::open(storage, config.storage_key.as_str());
    match command {
        EnrollmentCommand::Enroll { course_id } => {
            let catalog = Catalog::load(&config.catalog_path)?;
            let course = catalog.get(&course_id)?;
            match store.enroll_in_course(course.snapshot()) {
                EnrollOutcome::Enrolled => println!("enrolled in {}", course.title),
                EnrollOutcome::AlreadyEnrolled => {
                    bail!("{}", store.error().unwrap_or("enrollment rejected"))
                }
            }
        }
        EnrollmentCommand::Unenroll { course_id } => store.unenroll_from_course(&course_id),
        EnrollmentCommand::Progress {
            course_id,
            progress,
            completed_lessons,
        } => {
            store.update_course_progress(&course_id, progress, completed_lessons);
            if let Some(course) = store.get_enrolled_course(&course_id) {
                print_enrolled_course(course);
            }
        }
        EnrollmentCommand::Complete { course_id } => {
            store.mark_course_completed(&course_id);
            if let Some(course) = store.get_enrolled_course(&course_id) {
                print_enrolled_course(course);
            }
        }
        EnrollmentCommand::List { status } => {
            let courses = match status {
                Some(status) => store.get_courses_by_status(status.parse::<CourseStatus>()?),
                None => store.enrolled_courses().iter().collect(),
            };
            for course in courses {
                print_enrolled_course(course);
            }
            println!("total progress: {}%", store.get_total_progress());
        }
        EnrollmentCommand::Stats => {
            println!(
                "{}",
                serde_json::to_string_pretty(&store.get_learning_stats())?
            );
        }
    }
    Ok(())
}

async fn run_applications(config: &Config, command: ApplicationCommand) -> anyhow::Result<()> {
    ensure_database_dir(&config.database_url)?;
    let repository = ApplicationRepository::connect(&config.database_url).await?;
    match command {
        ApplicationCommand::Submit {
            user_id,
            name,
            email,
            expertise,
            bio,
            verified,
        } => {
            let applicant = Applicant {
                id: user_id,
                display_name: name,
                email,
                email_verified: verified,
            };
            let app = repository
                .submit(&applicant, ApplicationForm { expertise, bio })
                .await?;
            println!("application {} submitted ({})", app.id, app.status);
        }
        ApplicationCommand::List { status } => {
            let status = status
                .map(|s| s.parse::<ApplicationStatus>())
                .transpose()?;
            for app in repository.list(status).await? {
                println!(
                    "{}\t{}\t{}\t{}\t{}",
                    app.id,
                    app.status,
                    app.name,
                    app.expertise,
                    app.rejection_reason.unwrap_or_default()
                );
            }
        }
        ApplicationCommand::Approve { id } => {
            let app = repository.approve(id).await?;
            println!("application {} {}", app.id, app.status);
        }
        ApplicationCommand::Reject { id, reason } => {
            let app = repository.reject(id, &reason).await?;
            println!("application {} {}: {reason}", app.id, app.status);
        }
    }
    Ok(())
}

/// sqlite creates the file with `mode=rwc` but not its parent directory
fn ensure_database_dir(url: &str) -> anyhow::Result<()> {
    let Some(path) = url.strip_prefix("sqlite://") else {
        return Ok(());
    };
    let path = path.split('?').next().unwrap_or_default();
    if let Some(parent) = Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

fn print_catalog_course(course: &CatalogCourse) {
    println!(
        "{}\t{}\t{}\t{:.1}\t{}",
        course.id, course.category, course.difficulty, course.rating, course.title
    );
}

fn print_enrolled_course(course: &EnrolledCourse) {
    println!(
        "{}\t{}\t{}%\t{}/{}\t{}",
        course.id,
        course.status,
        course.progress,
        course.completed_lessons,
        course.total_lessons,
        course.title
    );
}
