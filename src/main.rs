use anyhow::Result;
use lazy_static::lazy_static;
use oss_file_storage::{Config, FileStorage, OssFileStorage};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

lazy_static! {
    static ref CONFIG: Result<Config, String> = Config::load().map_err(|e| e.to_string());
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::from_filename(".env").ok();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or("none".into())
        .add_directive("oss_file_storage=trace".parse()?);

    let subscriber = tracing_subscriber::fmt()
        // Use a more compact, abbreviated log format
        .compact()
        .with_env_filter(filter)
        // Display source code file paths
        .with_file(true)
        // Display source code line numbers
        .with_line_number(true)
        .with_target(false)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    let config = CONFIG.as_ref().map_err(|e| anyhow::anyhow!("{}", e))?;
    let storage = OssFileStorage::connect(config.storage.clone()).await?;

    let paths = std::env::args().skip(1).collect::<Vec<_>>();
    if paths.is_empty() {
        error!("No files given, usage: oss_file_storage <FILE>...");
        return Ok(());
    }

    for path in paths {
        let file_name = std::path::Path::new(&path)
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.clone());
        let mut file = tokio::fs::File::open(&path).await?;
        let file_ref = storage.save_stream(&file_name, &mut file).await?;
        info!(%file_ref, "Uploaded {}", path);
        println!("{}", file_ref);
    }

    Ok(())
}
