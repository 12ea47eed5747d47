//! Repository adapters for persistence layer

use std::sync::Arc;

use parcel_infra::{FileBlobStorage, FileConditionRepository, FileOrderDirectory};
use parcel_types::Result;
use tracing::debug;

use crate::config::Config;
use crate::flow::FlowServices;
use crate::readiness;

/// Open file-based condition repository
pub fn open_condition_repo(config: &Config) -> Result<FileConditionRepository> {
    let store_dir = config.store_dir()?;
    FileConditionRepository::open(store_dir)
}

/// Open photo blob storage next to the condition store
pub fn open_blob_storage(config: &Config) -> Result<FileBlobStorage> {
    FileBlobStorage::open(config.blob_dir()?)
}

/// Open the order directory; empty when no order file is configured
pub fn open_order_directory(config: &Config) -> Result<FileOrderDirectory> {
    match &config.orders_file {
        Some(path) => FileOrderDirectory::new(path.clone()),
        None => {
            debug!("no orders_file configured; order lookups will be empty");
            Ok(FileOrderDirectory::empty())
        }
    }
}

/// Wire up everything a condition flow needs. The condition repository is
/// also returned for read-only queries.
pub async fn open_services(
    config: &Config,
) -> Result<(Arc<FileConditionRepository>, Arc<FlowServices>)> {
    let conditions = Arc::new(open_condition_repo(config)?);
    let blobs = Arc::new(open_blob_storage(config)?);
    let orders = Arc::new(open_order_directory(config)?);
    let vision = readiness::vision_for(config).await?;

    let services = FlowServices {
        conditions: conditions.clone(),
        blobs,
        orders,
        vision,
        change_threshold: config.change_threshold,
    };
    Ok((conditions, Arc::new(services)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use parcel_domain::repository::OrderDirectory;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_open_services_under_store_dir() {
        let dir = tempdir().unwrap();
        let orders = dir.path().join("orders.toml");
        std::fs::write(&orders, "[[orders]]\norder_id = \"ORD-1\"\n").unwrap();
        let config = Config {
            store_dir: Some(dir.path().join("store")),
            orders_file: Some(orders),
            vision_enabled: false,
            ..Config::default()
        };

        let (repo, services) = open_services(&config).await.unwrap();
        assert!(dir.path().join("store").join("photos").is_dir());
        assert!(!services.vision.is_ready());
        assert!(services.orders.find_order("ORD-1").unwrap().is_some());
        assert_eq!(repo.with_store(|s| s.count()).unwrap(), 0);
    }

    #[test]
    fn test_missing_orders_file_is_empty_directory() {
        let config = Config::default();
        let orders = open_order_directory(&config).unwrap();
        assert!(orders.find_order("ORD-1").unwrap().is_none());
    }
}
