// --- std ---
use std::{env, path::PathBuf, process, sync::Arc};
// --- crates.io ---
use async_std::task;
use clap::{Parser, Subcommand};
// --- roomwatcher ---
use roomwatcher::{
	config::Config,
	directory::DeployedContracts,
	error::RoomwatcherResult,
	history::{EventHistoryState, EventHistorySynchronizer, RefreshMode, Subscription},
	lobby,
	node::Node,
	r#type::*,
	room::{Chain, RoomView, RoomWatcher},
	source::LogSource,
};

#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
	/// JSON config, every field falls back to its default.
	#[arg(short, long)]
	config: Option<PathBuf>,
	#[command(subcommand)]
	command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
	/// Watch one room and log every change of its view.
	Room {
		room: Address,
		#[arg(short, long)]
		user: Option<Address>,
		/// Log a single view and exit.
		#[arg(long)]
		once: bool,
	},
	/// Rooms created by a user.
	Created { user: Address },
	/// Rooms joined by a user.
	Joined { user: Address },
	/// Id of the room created by a transaction.
	RoomId { tx_hash: Hash },
}

#[async_std::main]
async fn main() {
	if env::var("RUST_LOG").is_err() {
		env::set_var("RUST_LOG", "roomwatcher");
	}

	pretty_env_logger::init_timed();

	if let Err(e) = run(Cli::parse()).await {
		tracing::error!("{}", e);

		process::exit(1);
	}
}

async fn run(cli: Cli) -> RoomwatcherResult<()> {
	let config = match &cli.config {
		Some(path) => Config::load(path)?,
		None => Config::default(),
	};
	let node = Arc::new(Node::connect(config.rpc_url.clone(), config.height_cache()).await?);

	if node.chain_id() != config.chain_id {
		tracing::warn!(
			"Configured for chain `{}` but the node serves chain `{}`",
			config.chain_id,
			node.chain_id()
		);
	}

	let chain = Chain {
		source: node.clone(),
		reader: node.clone(),
		directory: Arc::new(DeployedContracts::load(&config.deployments, node.chain_id())?),
	};

	match cli.command {
		Command::Room { room, user, once } => watch_room(&config, chain, room, user, once).await,
		Command::Created { user } => {
			let history = fetch(&config, &chain, lobby::created_by(&config.contract_name, user)).await?;

			for summary in lobby::created_rooms(&history) {
				tracing::info!("{:?}", summary);
			}

			Ok(())
		}
		Command::Joined { user } => {
			let history = fetch(&config, &chain, lobby::joined_by(&config.contract_name, user)).await?;

			for room in lobby::joined_rooms(&history) {
				tracing::info!("{}", room);
			}

			Ok(())
		}
		Command::RoomId { tx_hash } => {
			let receipt = node.transaction_receipt(tx_hash).await?;

			tracing::info!("{}", lobby::room_id_from_receipt(&receipt)?);

			Ok(())
		}
	}
}

async fn fetch(
	config: &Config,
	chain: &Chain,
	subscription: Subscription,
) -> RoomwatcherResult<EventHistoryState> {
	let history = EventHistorySynchronizer::new(
		subscription,
		config.sync_config(),
		chain.source.clone(),
		chain.directory.clone(),
	)?;

	history.refresh(RefreshMode::Replace).await?;

	Ok(history.state().await)
}

async fn watch_room(
	config: &Config,
	chain: Chain,
	room: Address,
	user: Option<Address>,
	once: bool,
) -> RoomwatcherResult<()> {
	let watcher = RoomWatcher::start(
		room,
		user,
		config.contract_name.clone(),
		config.sync_config(),
		chain,
		!once,
	)
	.await?;
	let mut last = None::<RoomView>;

	loop {
		let view = watcher.view().await;

		if last.as_ref() != Some(&view) {
			tracing::info!("{:#?}", view);

			last = Some(view);
		}
		if once {
			break;
		}

		task::sleep(config.poll_interval()).await;

		// the record has no event of its own
		let _ = watcher.refresh_record().await;
	}

	watcher.stop().await;

	Ok(())
}
