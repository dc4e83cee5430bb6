use anyhow::Result;
use brandgen_pipeline::Catalog;
use std::path::Path;

pub fn run() -> Result<()> {
    println!("Built-in catalogs:");
    for name in Catalog::builtin_names() {
        if let Some(catalog) = Catalog::builtin(name) {
            print!("{}", describe(&catalog?));
        }
    }

    let project_dir = Path::new("catalogs");
    if project_dir.is_dir() {
        println!("\nProject catalogs ({}):", project_dir.display());
        let mut paths: Vec<_> = std::fs::read_dir(project_dir)?
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.to_string_lossy().ends_with(".catalog.toml"))
            .collect();
        paths.sort();

        for path in paths {
            match Catalog::load(&path) {
                Ok(catalog) => print!("{}", describe(&catalog)),
                Err(e) => eprintln!("  {}: {}", path.display(), e),
            }
        }
    }

    Ok(())
}

fn describe(catalog: &Catalog) -> String {
    let mut out = format!(
        "  {} ({}, on error: {:?}) -> {}\n",
        catalog.name(),
        catalog.settings.mode,
        catalog.settings.on_error,
        catalog.settings.output_dir.display()
    );
    if let Some(ref description) = catalog.settings.description {
        out.push_str(&format!("    {}\n", description));
    }
    out.push_str(&format!("    keys: {}\n", catalog.keys().join(", ")));
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_describe_lists_keys() {
        let catalog = Catalog::builtin("real-photos").unwrap().unwrap();
        let text = describe(&catalog);
        assert!(text.starts_with("  real-photos (restyle, on error: Halt) -> public/images/real"));
        assert!(text.contains("keys: fleet-1, fleet-2, fleet-3, fleet-4"));
    }
}
