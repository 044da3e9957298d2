use std::sync::Arc;

use ticker::WatcherSupervisor;

pub mod catalogue;
pub mod command;
pub mod config;
pub mod session;

use catalogue::Catalogue;

pub struct Data {
    pub supervisor: Arc<WatcherSupervisor>,
    pub catalogue: Arc<Catalogue>,
}

pub type Error = anyhow::Error;
pub type Context<'a> = poise::Context<'a, Data, Error>;
