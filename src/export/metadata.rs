//! Structural metadata export
//!
//! For every concrete index the requested scope resolves to, packets are
//! written strictly in this order: settings, then one mapping per type, then
//! (when requested) one packet per alias. Any cluster failure aborts the whole
//! phase; nothing is skipped silently.

use tracing::{debug, info};

use crate::archive::{ArchivePacket, ArchiveSession};
use crate::cluster::{ALL_INDICES, ClusterClient};
use crate::error::Result;

use super::resolver::{IndexTypes, RenameTable};

/// Packet counts of one metadata pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetadataStats {
    pub indices: u64,
    pub mappings: u64,
    pub aliases: u64,
}

/// Writes settings, mappings and aliases ahead of document data
pub struct MetadataExporter<'a> {
    cluster: &'a dyn ClusterClient,
    renames: &'a RenameTable,
    with_aliases: bool,
}

impl<'a> MetadataExporter<'a> {
    pub fn new(cluster: &'a dyn ClusterClient, renames: &'a RenameTable, with_aliases: bool) -> Self {
        Self {
            cluster,
            renames,
            with_aliases,
        }
    }

    /// Export metadata of every concrete index matched by `scope`
    ///
    /// # Arguments
    /// * `scope` - Requested indices (may hold wildcards and aliases) and their types
    /// * `session` - Sink receiving the packets
    pub async fn export(
        &self,
        scope: &IndexTypes,
        session: &mut dyn ArchiveSession,
    ) -> Result<MetadataStats> {
        let requested: Vec<String> = scope
            .keys()
            .filter(|index| index.as_str() != ALL_INDICES)
            .cloned()
            .collect();

        info!("getting settings for indices {:?}", requested);
        let settings = self.cluster.resolve_settings(&requested).await?;
        info!("found indices: {:?}", settings.keys().collect::<Vec<_>>());

        let mut stats = MetadataStats::default();
        for (index, index_settings) in &settings {
            let target = self.renames.map_index(index);
            session
                .write(&ArchivePacket::settings(&target, index_settings.as_str()))
                .await?;
            stats.indices += 1;

            let types = scope.get(index).cloned().unwrap_or_default();
            info!("getting mappings for index {} and types {:?}", index, types);
            let mappings = self.cluster.resolve_mapping(index, &types).await?;
            info!("found mappings: {:?}", mappings.keys().collect::<Vec<_>>());
            for (type_name, mapping) in &mappings {
                let target_type = self.renames.map_type(index, type_name);
                session
                    .write(&ArchivePacket::mapping(&target, &target_type, mapping.as_str()))
                    .await?;
                debug!("adding mapping: {}", target_type);
                stats.mappings += 1;
            }

            if self.with_aliases {
                info!("getting aliases for index {}", index);
                let aliases = self.cluster.resolve_aliases(index).await?;
                info!("found {} aliases", aliases.len());
                for (alias, definition) in &aliases {
                    session
                        .write(&ArchivePacket::alias(&target, alias, definition.as_str()))
                        .await?;
                    stats.aliases += 1;
                }
            }
        }

        Ok(stats)
    }
}
