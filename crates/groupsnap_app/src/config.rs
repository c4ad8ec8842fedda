use std::fs;
use std::path::Path;

use anyhow::Context;
use groupsnap_engine::RunConfig;
use groupsnap_logging::snap_info;

pub(crate) const DEFAULT_CONFIG_FILENAME: &str = "groupsnap.ron";

/// Token used when the config file carries none.
pub(crate) const TOKEN_ENV_VAR: &str = "GROUPSNAP_TOKEN";

pub(crate) fn load_config(path: &Path) -> anyhow::Result<RunConfig> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    let config = parse_config(&text, std::env::var(TOKEN_ENV_VAR).ok())
        .with_context(|| format!("invalid config file {}", path.display()))?;
    snap_info!(
        "Loaded config from {:?}: group {}, concurrency {}, output {:?}",
        path,
        config.group_id,
        config.concurrency,
        config.output_dir
    );
    Ok(config)
}

fn parse_config(text: &str, env_token: Option<String>) -> anyhow::Result<RunConfig> {
    let mut config: RunConfig = ron::from_str(text)?;
    if config.token.is_none() {
        config.token = env_token.filter(|t| !t.trim().is_empty());
    }
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn file_token_wins_over_environment() {
        let config = parse_config(
            r#"(group_id: "42", token: Some("file"))"#,
            Some("env".to_string()),
        )
        .unwrap();
        assert_eq!(config.token.as_deref(), Some("file"));

        let config = parse_config(r#"(group_id: "42")"#, Some("env".to_string())).unwrap();
        assert_eq!(config.token.as_deref(), Some("env"));
    }

    #[test]
    fn out_of_range_concurrency_is_rejected() {
        let err = parse_config(r#"(group_id: "42", concurrency: 12)"#, None).unwrap_err();
        assert!(err.to_string().contains("concurrency"));
    }

    #[test]
    fn loads_full_config_from_disk() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join(DEFAULT_CONFIG_FILENAME);
        fs::write(
            &path,
            r#"(
                group_id: "42",
                concurrency: 5,
                output_dir: "media",
                state_dir: Some("state"),
                timeout_secs: 30,
                pacing_millis: 0,
                api_base_url: Some("http://localhost:9999/v3"),
            )"#,
        )
        .unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.concurrency, 5);
        assert_eq!(config.output_dir, PathBuf::from("media"));
        assert_eq!(config.state_dir(), PathBuf::from("state"));
        assert_eq!(config.api_settings().base_url, "http://localhost:9999/v3");
    }

    #[test]
    fn missing_file_names_the_path() {
        let err = load_config(Path::new("/definitely/not/here.ron")).unwrap_err();
        assert!(err.to_string().contains("/definitely/not/here.ron"));
    }
}
