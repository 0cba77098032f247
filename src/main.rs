mod addr;
mod cache;
mod config;
mod error;
mod hierarchy;
mod lru;
mod stats;
mod trace;

use std::{fs, path::PathBuf, process};

use config::Config;
use error::Error;
use hierarchy::CacheHierarchy;
use stats::Stats;
use trace::Trace;

fn main() {
    env_logger::init();

    match run() {
        Ok(stats) => println!("{stats}"),
        Err(err) => {
            eprintln!("{err}");
            process::exit(1);
        }
    }
}

fn run() -> Result<Stats, Error> {
    let mut args = pico_args::Arguments::from_env();
    let n_warm: u64 = args.opt_value_from_str("-w")?.unwrap_or(0);
    let heartbeat_int: u64 = args.opt_value_from_str("-h")?.unwrap_or(0);
    let req_per_block: usize = args
        .opt_value_from_str("--buffer-size")?
        .unwrap_or(1024 * 16);
    let blocks_per_queue: usize = args.opt_value_from_str("--queue-size")?.unwrap_or(32);
    let stats_path: Option<PathBuf> = args.opt_value_from_str("--json")?;

    let file_config = if let Some(config_str) = args.opt_value_from_str::<_, String>("--config")? {
        Config::from_json(&config_str)?
    } else if let Some(config_path) = args.opt_value_from_str::<_, PathBuf>("-p")? {
        Config::from_file(config_path)?
    } else {
        Config::default()
    };
    let config = file_config.overlay(Config::from_args(&mut args)?).build()?;

    let trace_path: PathBuf = match args.opt_value_from_str("-t")? {
        Some(path) => path,
        None => args.opt_free_from_str()?.ok_or(Error::NoTrace)?,
    };
    let rest = args.finish();
    if !rest.is_empty() {
        return Err(Error::Unused(rest));
    }

    log::info!("{config:?}");
    let mut hierarchy = config.to_hierarchy();
    let trace = Trace::open(&trace_path, req_per_block, blocks_per_queue)?;

    let n_requests = replay(&mut hierarchy, &trace, n_warm, heartbeat_int)?;
    log::info!("Ran {n_requests} requests");

    let stats = hierarchy.finalize();
    if let Some(path) = stats_path {
        let stats_file =
            fs::File::create(&path).map_err(|source| Error::Stats { path, source })?;
        serde_json::to_writer_pretty(stats_file, &stats)?;
    }
    Ok(stats)
}

/// Feeds every request to the hierarchy in trace order. Statistics are
/// reset once `n_warm` requests have been seen.
fn replay(
    hierarchy: &mut CacheHierarchy,
    trace: &Trace,
    n_warm: u64,
    heartbeat_int: u64,
) -> Result<u64, Error> {
    let mut n_requests = 0;
    let mut next_heartbeat = heartbeat_int;

    for block in trace.blocks() {
        for request in block? {
            hierarchy.access(request.addr, request.op);
            n_requests += 1;

            if n_requests == n_warm {
                hierarchy.clear_stats();
                log::info!("Finished warmup after {n_warm} requests");
            }
            if heartbeat_int != 0 && n_requests >= next_heartbeat {
                log::info!("Requests: {n_requests}");
                next_heartbeat += heartbeat_int;
            }
        }
    }
    Ok(n_requests)
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    const SCENARIO: &str = r#"{
        "mem_cyc": 100, "bsize": 2, "wr_alloc": true,
        "l1": { "size": 4, "assoc": 0, "cyc": 1 },
        "l2": { "size": 6, "assoc": 1, "cyc": 5 }
    }"#;

    fn replay_text(text: &'static str, n_warm: u64) -> Result<Stats, Error> {
        let mut hierarchy = Config::from_json(SCENARIO)?.build()?.to_hierarchy();
        let trace = Trace::from_reader(Cursor::new(text), 2, 2);
        let _ = replay(&mut hierarchy, &trace, n_warm, 1)?;
        Ok(hierarchy.finalize())
    }

    #[test]
    fn replays_whole_trace() {
        let stats = replay_text("r 0x0\nr 0x0\n", 0).unwrap();
        assert_eq!(stats.to_string(), "L1miss=0.500 L2miss=1.000 AccTimeAvg=53.500");
    }

    #[test]
    fn warmup_discards_early_counters() {
        let stats = replay_text("r 0x0\nr 0x10\nr 0x10\nr 0x10\n", 2).unwrap();
        assert_eq!(stats.levels[0].accesses, 2);
        assert_eq!(stats.l1_miss_rate, 0.0);
        assert_eq!(stats.avg_access_time, 1.0);
    }

    #[test]
    fn unknown_op_lines_are_skipped() {
        let stats = replay_text("r 0x0\nx 0x8\nr 0x0\n", 0).unwrap();
        assert_eq!(stats.to_string(), "L1miss=0.500 L2miss=1.000 AccTimeAvg=53.500");
    }

    #[test]
    fn malformed_line_yields_no_stats() {
        let result = replay_text("r 0x0\nw 0x4\nr 0x8\nfoo\nr 0xc\n", 0);
        assert!(matches!(
            result,
            Err(Error::Trace(trace::TraceError::Parse { line: 4, .. }))
        ));
    }
}
