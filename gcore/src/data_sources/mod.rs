//! Data sources looking up cloud projects and regions by name

mod project;
mod region;

pub use project::ProjectDataSource;
pub use region::RegionDataSource;

use tfplug::types::Diagnostic;

fn not_found(kind: &str, name: &str, available: impl Iterator<Item = String>) -> Diagnostic {
    let available: Vec<String> = available.collect();
    Diagnostic::error(
        format!("{} not found", kind),
        format!(
            "no {} named '{}'; available: {}",
            kind.to_lowercase(),
            name,
            available.join(", ")
        ),
    )
}
