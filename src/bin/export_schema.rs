use course_enrollment::enrollment::persisted_schema;

fn main() -> anyhow::Result<()> {
    let path = std::env::args()
        .nth(1)
        .unwrap_or("enrollment-storage.schema.json".to_string());
    let json = serde_json::to_string_pretty(&persisted_schema())?;
    std::fs::write(&path, json)?;
    println!("schema written to {path}");
    Ok(())
}
