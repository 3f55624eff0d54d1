//! `fees init` - write a starter configuration.

use std::path::Path;

use console::style;

use crate::config::Config;

pub fn cmd_init(config_path: &Path, data_dir: Option<&Path>, force: bool) -> anyhow::Result<()> {
    if config_path.exists() && !force {
        anyhow::bail!(
            "{} already exists (use --force to overwrite)",
            config_path.display()
        );
    }

    let mut config = Config::starter_banking();
    if let Some(dir) = data_dir {
        config.data_dir = dir.to_path_buf();
    }
    config.save(config_path)?;

    std::fs::create_dir_all(&config.data_dir)?;
    for entity_id in config.domain.entities.keys() {
        std::fs::create_dir_all(config.data_dir.join(entity_id))?;
    }

    println!(
        "{} Wrote {} with the starter {} domain",
        style("✓").green(),
        config_path.display(),
        config.domain.name
    );
    println!(
        "  Data directory: {} (one folder per entity)",
        config.data_dir.display()
    );
    println!("  Add document URLs under [domain.entities.<id>] and run `fees fetch`.");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_writes_loadable_config() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("feeacquire.toml");
        let data_dir = dir.path().join("data");

        cmd_init(&config_path, Some(&data_dir), false).unwrap();
        assert!(data_dir.join("alpha").is_dir());

        let loaded = Config::load(&config_path).unwrap();
        assert_eq!(loaded.domain.name, "banking");

        // A second run without --force must not clobber the file.
        assert!(cmd_init(&config_path, Some(&data_dir), false).is_err());
        assert!(cmd_init(&config_path, Some(&data_dir), true).is_ok());
    }
}
