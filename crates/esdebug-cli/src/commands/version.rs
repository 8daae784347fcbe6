use esdebug_core::version::{version_string, VERSION};
use miette::Result;

pub fn run(json: bool) -> Result<()> {
    if json {
        let info = serde_json::json!({
            "name": "esdebug",
            "version": VERSION,
        });
        println!("{info}");
    } else {
        println!("{}", version_string());
    }
    Ok(())
}
