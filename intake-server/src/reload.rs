//! Configuration live reload using file watcher

use crate::AppState;
use anyhow::Result;
use intake_common::{IntakeConfig, MappingError, PostDistrictMapper};
use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

const DEBOUNCE: Duration = Duration::from_millis(500);

/// Watch the config file and the mapping file it names; reload on change
pub async fn watch_config(state: Arc<AppState>) -> Result<()> {
    let config_path = state.config_path.clone();

    if !config_path.exists() {
        warn!("Config file does not exist, skipping file watcher");
        return Ok(());
    }

    let (tx, mut rx) = mpsc::channel::<Vec<PathBuf>>(100);

    // Create watcher
    let mut watcher = RecommendedWatcher::new(
        move |res: Result<Event, notify::Error>| {
            if let Ok(event) = res {
                if event.kind.is_modify() || event.kind.is_create() {
                    let _ = tx.blocking_send(event.paths);
                }
            }
        },
        Config::default(),
    )?;

    let mut watched = HashSet::new();
    let mut targets = watch_targets(&state).await;
    watch_parents(&mut watcher, &mut watched, &targets)?;

    info!("Watching {} for changes", config_path.display());

    while let Some(paths) = rx.recv().await {
        if !touches(&paths, &targets) {
            continue;
        }

        // Let the burst of events from one save settle, then take the last state
        tokio::time::sleep(DEBOUNCE).await;
        while rx.try_recv().is_ok() {}

        match reload_config(&state).await {
            Ok(()) => info!("Configuration reloaded successfully"),
            Err(e) => error!("Failed to reload configuration: {}", e),
        }

        targets = watch_targets(&state).await;
        if let Err(e) = watch_parents(&mut watcher, &mut watched, &targets) {
            warn!("Failed to watch mapping file directory: {}", e);
        }
    }

    Ok(())
}

/// Files whose change triggers a reload
async fn watch_targets(state: &AppState) -> Vec<PathBuf> {
    let mut targets = vec![resolve(&state.config_path)];
    if let Some(mapping) = &state.config.read().await.postcodes.mapping_file {
        targets.push(resolve(Path::new(mapping)));
    }
    targets
}

fn watch_parents(
    watcher: &mut RecommendedWatcher,
    watched: &mut HashSet<PathBuf>,
    targets: &[PathBuf],
) -> notify::Result<()> {
    for dir in targets.iter().filter_map(|target| target.parent()) {
        if !watched.contains(dir) {
            watcher.watch(dir, RecursiveMode::NonRecursive)?;
            debug!("Watching directory {}", dir.display());
            watched.insert(dir.to_path_buf());
        }
    }
    Ok(())
}

/// Absolute form of `path` with its directory canonicalized
fn resolve(path: &Path) -> PathBuf {
    let parent = path
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    let parent = parent.canonicalize().unwrap_or_else(|_| parent.to_path_buf());
    match path.file_name() {
        Some(name) => parent.join(name),
        None => parent,
    }
}

fn touches(paths: &[PathBuf], targets: &[PathBuf]) -> bool {
    paths.iter().any(|path| targets.contains(&resolve(path)))
}

/// Reload configuration and postal district mapping from file.
///
/// Nothing changes unless both load and validate.
pub async fn reload_config(state: &Arc<AppState>) -> Result<()> {
    let mut new_config = IntakeConfig::load(&state.config_path)?;
    apply_env_overrides(&mut new_config);
    new_config.validate()?;

    let new_mapper = mapper_for(&new_config)?;

    let mut config = state.config.write().await;
    let mut mapper = state.mapper.write().await;
    *config = new_config;
    *mapper = new_mapper;

    Ok(())
}

/// Build the mapper a configuration asks for
pub fn mapper_for(config: &IntakeConfig) -> Result<PostDistrictMapper, MappingError> {
    match &config.postcodes.mapping_file {
        Some(path) => {
            let mapper = PostDistrictMapper::load(path)?;
            info!(
                "Loaded {} postal districts from {}",
                mapper.district_count().unwrap_or_default(),
                path
            );
            Ok(mapper)
        }
        None => Ok(PostDistrictMapper::passthrough()),
    }
}

/// `MAINTENANCE_MODE=true|false` overrides the file setting
pub fn apply_env_overrides(config: &mut IntakeConfig) {
    if let Ok(value) = std::env::var("MAINTENANCE_MODE") {
        match value.trim().parse::<bool>() {
            Ok(enabled) => config.submission.maintenance_mode = enabled,
            Err(_) => warn!("Ignoring MAINTENANCE_MODE={:?}, expected true or false", value),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::UniqueObjectKeyNameProvider;

    fn state_for(dir: &tempfile::TempDir) -> Arc<AppState> {
        Arc::new(AppState::new(
            IntakeConfig::default(),
            PostDistrictMapper::passthrough(),
            dir.path().join("intake.toml"),
            Arc::new(UniqueObjectKeyNameProvider),
        ))
    }

    #[tokio::test]
    async fn test_reload_swaps_config_and_mapper() {
        let dir = tempfile::tempdir().unwrap();
        let mapping = dir.path().join("districts.toml");
        std::fs::write(&mapping, "[districts.AB13]\nmerged = \"AB13_AB14\"\n").unwrap();

        let mut config = IntakeConfig::default();
        config.submission.bearer_tokens = vec!["secret".to_string()];
        config.postcodes.mapping_file = Some(mapping.to_string_lossy().into_owned());

        let state = state_for(&dir);
        config.save(&state.config_path).unwrap();

        reload_config(&state).await.unwrap();

        assert_eq!(state.config.read().await.submission.bearer_tokens, vec!["secret"]);
        let mapper = state.mapper.read().await;
        assert_eq!(mapper.district_count(), Some(1));
        assert_eq!(mapper.map("AB13", None).postal_district, "AB13_AB14");
    }

    #[tokio::test]
    async fn test_failed_reload_keeps_old_config() {
        let dir = tempfile::tempdir().unwrap();
        let state = state_for(&dir);

        let mut config = IntakeConfig::default();
        config.forward.enabled = true;
        config.save(&state.config_path).unwrap();
        assert!(reload_config(&state).await.is_err());
        assert!(!state.config.read().await.forward.enabled);

        let mut config = IntakeConfig::default();
        config.postcodes.mapping_file = Some("/nonexistent/districts.toml".to_string());
        config.save(&state.config_path).unwrap();
        assert!(reload_config(&state).await.is_err());
        assert!(state.config.read().await.postcodes.mapping_file.is_none());
        assert_eq!(state.mapper.read().await.district_count(), None);
    }

    #[test]
    fn test_only_watched_files_trigger_reload() {
        let dir = tempfile::tempdir().unwrap();
        let config = dir.path().join("intake.toml");
        let mapping = dir.path().join("districts.toml");
        let targets = vec![resolve(&config), resolve(&mapping)];

        assert!(touches(&[config.clone()], &targets));
        assert!(touches(&[dir.path().join("other.txt"), mapping], &targets));
        assert!(!touches(&[dir.path().join("other.txt")], &targets));
        assert!(!touches(&[dir.path().join(".intake.toml.swp")], &targets));
        assert!(!touches(&[], &targets));
    }

    /// Poll until `check` holds or a few seconds pass
    async fn eventually<F, Fut>(check: F) -> bool
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = bool>,
    {
        for _ in 0..50 {
            if check().await {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        false
    }

    fn save_with_token(state: &AppState, token: &str) {
        let mut config = IntakeConfig::default();
        config.submission.bearer_tokens = vec![token.to_string()];
        config.save(&state.config_path).unwrap();
    }

    #[tokio::test]
    async fn test_unrelated_file_keeps_runtime_maintenance_mode() {
        let dir = tempfile::tempdir().unwrap();
        let state = state_for(&dir);
        IntakeConfig::default().save(&state.config_path).unwrap();

        let watcher = tokio::spawn(watch_config(state.clone()));
        tokio::time::sleep(Duration::from_millis(200)).await;

        state.config.write().await.submission.maintenance_mode = true;
        std::fs::write(dir.path().join("other.txt"), "unrelated").unwrap();
        tokio::time::sleep(DEBOUNCE * 3).await;
        assert!(state.config.read().await.submission.maintenance_mode);

        // the watcher is live: a config write does reload
        save_with_token(&state, "secret");
        let shared = &state;
        let reloaded = eventually(move || async move {
            shared.config.read().await.submission.bearer_tokens == ["secret"]
        })
        .await;
        assert!(reloaded);
        assert!(!state.config.read().await.submission.maintenance_mode);

        watcher.abort();
    }

    #[tokio::test]
    async fn test_rapid_writes_apply_the_last_one() {
        let dir = tempfile::tempdir().unwrap();
        let state = state_for(&dir);
        IntakeConfig::default().save(&state.config_path).unwrap();

        let watcher = tokio::spawn(watch_config(state.clone()));
        tokio::time::sleep(Duration::from_millis(200)).await;

        save_with_token(&state, "first");
        tokio::time::sleep(DEBOUNCE / 2).await;
        save_with_token(&state, "second");

        let shared = &state;
        let settled = eventually(move || async move {
            shared.config.read().await.submission.bearer_tokens == ["second"]
        })
        .await;
        assert!(settled);

        watcher.abort();
    }
}
