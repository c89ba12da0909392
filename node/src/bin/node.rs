use clap::{Arg, Command};
use commonware_runtime::{tokio, Metrics, Runner, Spawner};
use finality_aggregator::{handler::Handler, supervisor::Supervisor};
use finality_node::{simulate, Config};
use futures::StreamExt;
use std::time::Duration;
use tracing::{info, warn, Level};

fn main() {
    // Parse arguments
    let matches = Command::new("node")
        .about("aggregate finality attestations")
        .arg(Arg::new("config").long("config").required(true))
        .get_matches();

    // Create logger
    tracing_subscriber::fmt()
        .json()
        .with_max_level(Level::DEBUG)
        .with_line_number(true)
        .with_file(true)
        .init();

    // Load config
    let config_file = matches.get_one::<String>("config").expect("provide --config");
    let config_file = std::fs::read_to_string(config_file).expect("Could not read config file");
    let config = Config::parse(&config_file).expect("Could not parse config file");
    let registry = config.registry().expect("Could not load operators");
    let signers = config.signers().expect("Could not load simulation keys");
    info!(
        operators = config.operators.len(),
        quorums = ?config.quorum_numbers,
        thresholds = ?config.quorum_threshold_percentages,
        simulated = signers.len(),
        "loaded config"
    );

    // Start runtime
    let executor = tokio::Runner::default();
    executor.start(|context| async move {
        // Start supervisor
        let (supervisor, mailbox, mut results) = Supervisor::new(
            context.with_label("supervisor"),
            config.supervisor_config(registry.clone()),
        );
        supervisor.start();
        let handler = Handler::new(
            context.with_label("handler"),
            mailbox,
            config.handler_config(registry),
        );

        // Start simulated operators
        if let Some(simulation) = &config.simulation {
            let rollup_id = simulation.rollup_id;
            let interval = Duration::from_millis(simulation.interval_ms);
            context.with_label("simulation").spawn(move |context| {
                simulate(context, handler, signers, rollup_id, interval)
            });
        }

        // Consume results
        while let Some(result) = results.next().await {
            match result.outcome {
                Ok(aggregation) => info!(
                    digest = %result.digest,
                    block = aggregation.eth_block_number,
                    signers = aggregation.signers.len(),
                    non_signers = aggregation.non_signer_pubkeys_g1.len(),
                    signed_stake = ?aggregation.signed_stake_per_quorum,
                    "aggregation completed"
                ),
                Err(err) => warn!(digest = %result.digest, ?err, "aggregation failed"),
            }
        }
    });
}
