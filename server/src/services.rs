//! Processors of this service and their consumer and sweep wiring.

use crate::config::{Config, RedisConfig, SweepConfig, Topics};
use atlas_buffs::BuffProcessor;
use atlas_cashshop::{CashAssetProcessor, HttpCommodityCatalog, WalletProcessor};
use atlas_core::consumer::Dispatcher;
use atlas_core::environment::Clock;
use atlas_core::producer::Producer;
use atlas_core::registry::{MemoryBackend, RegistryBackend};
use atlas_core::Result;
use atlas_fame::{FameProcessor, HttpCharacterDirectory};
use atlas_login_history::{LoginHistoryProcessor, PurgeSweep, SessionStatusHandler};
use atlas_messengers::MessengerProcessor;
use atlas_parties::PartyProcessor;
use atlas_redis::RedisBackend;
use atlas_runtime::Sweep;
use sqlx::PgPool;
use std::sync::Arc;

/// Registry storage: Redis when configured, process memory otherwise.
///
/// # Errors
///
/// [`atlas_core::Error::Downstream`] when Redis is configured but unreachable.
pub async fn registry_backend(config: &RedisConfig) -> Result<Arc<dyn RegistryBackend>> {
    match &config.url {
        Some(url) => Ok(Arc::new(RedisBackend::new(url).await?)),
        None => {
            tracing::warn!("REDIS_URL not set, registries are kept in memory");
            Ok(Arc::new(MemoryBackend::new()))
        }
    }
}

/// Every processor of the service, constructed once at start.
#[derive(Clone)]
pub struct Services {
    /// Producer all units of work emit through
    pub producer: Arc<dyn Producer>,
    /// Parties
    pub parties: PartyProcessor,
    /// Messengers
    pub messengers: MessengerProcessor,
    /// Character buffs
    pub buffs: BuffProcessor,
    /// Fame
    pub fame: FameProcessor,
    /// Cash-shop assets
    pub cash_assets: CashAssetProcessor,
    /// Cash-shop wallets
    pub wallets: WalletProcessor,
    /// Login history
    pub login_history: LoginHistoryProcessor,
}

impl Services {
    /// Build every processor over the shared collaborators.
    #[must_use]
    pub fn new(
        config: &Config,
        backend: &Arc<dyn RegistryBackend>,
        pool: &PgPool,
        producer: Arc<dyn Producer>,
        clock: &Arc<dyn Clock>,
    ) -> Self {
        Self {
            producer,
            parties: PartyProcessor::new(atlas_parties::registry(backend.clone())),
            messengers: MessengerProcessor::new(atlas_messengers::registry(backend.clone())),
            buffs: BuffProcessor::new(atlas_buffs::registry(backend.clone()), clock.clone())
                .with_poison_ticks(atlas_buffs::poison_registry(backend.clone())),
            fame: FameProcessor::new(
                pool.clone(),
                Arc::new(HttpCharacterDirectory::new(&config.services.character_url)),
                clock.clone(),
            ),
            cash_assets: CashAssetProcessor::new(
                pool.clone(),
                Arc::new(HttpCommodityCatalog::new(&config.services.commodity_url)),
                config.cashshop.hourly_expirations.clone(),
                clock.clone(),
            ),
            wallets: WalletProcessor::new(pool.clone()),
            login_history: LoginHistoryProcessor::new(pool.clone(), clock.clone())
                .with_retention_days(config.sweeps.login_retention_days),
        }
    }

    /// Consumer routes for every command and event topic this service reads.
    #[must_use]
    pub fn dispatcher(&self, topics: &Topics) -> Dispatcher {
        let producer = &self.producer;
        Dispatcher::new()
            .register(
                &topics.party_command,
                Arc::new(atlas_parties::CommandHandler::new(self.parties.clone(), producer.clone())),
            )
            .register(
                &topics.messenger_command,
                Arc::new(atlas_messengers::CommandHandler::new(self.messengers.clone(), producer.clone())),
            )
            .register(
                &topics.buff_command,
                Arc::new(atlas_buffs::CommandHandler::new(self.buffs.clone(), producer.clone())),
            )
            .register(
                &topics.fame_command,
                Arc::new(atlas_fame::CommandHandler::new(self.fame.clone(), producer.clone())),
            )
            .register(
                &topics.character_status,
                Arc::new(atlas_fame::CharacterStatusHandler::new(self.fame.clone())),
            )
            .register(
                &topics.character_status,
                Arc::new(atlas_parties::CharacterStatusHandler::new(self.parties.clone(), producer.clone())),
            )
            .register(
                &topics.character_status,
                Arc::new(atlas_messengers::CharacterStatusHandler::new(
                    self.messengers.clone(),
                    producer.clone(),
                )),
            )
            .register(
                &topics.cash_asset_command,
                Arc::new(atlas_cashshop::CommandHandler::new(self.cash_assets.clone(), producer.clone())),
            )
            .register(
                &topics.wallet_command,
                Arc::new(atlas_cashshop::WalletCommandHandler::new(self.wallets.clone(), producer.clone())),
            )
            .register(
                &topics.account_session_status,
                Arc::new(SessionStatusHandler::new(self.login_history.clone())),
            )
    }

    /// Background sweeps.
    #[must_use]
    pub fn sweeps(&self, config: &SweepConfig) -> Vec<Arc<dyn Sweep>> {
        vec![
            Arc::new(atlas_buffs::ExpirationSweep::new(
                self.buffs.clone(),
                self.producer.clone(),
                config.buff(),
            )),
            Arc::new(atlas_buffs::PoisonSweep::new(
                self.buffs.clone(),
                self.producer.clone(),
                config.poison(),
            )),
            Arc::new(atlas_cashshop::ExpirationSweep::new(
                self.cash_assets.clone(),
                self.producer.clone(),
                config.cash_asset(),
            )),
            Arc::new(PurgeSweep::new(self.login_history.clone(), config.login_purge())),
        ]
    }
}
