/*!
 * Common test utilities for the chunkwise test suite
 */

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use tempfile::TempDir;

use chunkwise::app_config::Config;
use chunkwise::pipeline::Pipeline;
use chunkwise::providers::mock::ScriptedModel;

/// Creates a temporary directory for test files
pub fn create_temp_dir() -> Result<TempDir> {
    Ok(TempDir::new()?)
}

/// Creates a test file with the given content in the specified directory
pub fn create_test_file(dir: &Path, filename: &str, content: &str) -> Result<PathBuf> {
    let file_path = dir.join(filename);
    fs::write(&file_path, content)?;
    Ok(file_path)
}

/// Route library logs to the test harness
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Config with the given chunk bounds and fast retries
pub fn test_config(min_size: usize, max_size: usize) -> Config {
    let mut config = Config::default();
    config.chunking.min_size = min_size;
    config.chunking.max_size = max_size;
    config.session.retry_backoff_ms = 1;
    config.session.call_timeout_secs = 5;
    config
}

/// Pipeline over a mock model; the model handle stays usable for assertions
pub fn mock_pipeline(config: Config, model: &ScriptedModel) -> Pipeline {
    init_logging();
    Pipeline::new(config, Arc::new(model.clone())).expect("test config should be valid")
}

/// A sentence-like paragraph of exactly `chars` characters, no trailing break
pub fn paragraph(chars: usize, word: &str) -> String {
    let mut text = String::new();
    while text.chars().count() < chars.saturating_sub(1) {
        if !text.is_empty() {
            text.push(' ');
        }
        text.push_str(word);
    }
    let mut text: String = text.chars().take(chars.saturating_sub(1)).collect();
    text.push('.');
    text
}

/// A short Japanese story with scene markers and blank-line paragraphs
pub const JAPANESE_STORY: &str = "〇駅前\n\n山田は朝早く駅に着いた。電車はまだ来ていない。\n\n\
彼はベンチに座って、古い手紙を読み返した。手紙には見覚えのない名前が書かれていた。\n\n\
〇車内\n\n電車が動き出すと、山田は窓の外を眺めた。田んぼが朝日に光っていた。\n\n\
隣の席の老人が話しかけてきた。「どちらまで？」山田は少し考えてから答えた。「終点まで」";
