use std::fs;
use std::io::{self, Read};
use std::path::PathBuf;
use std::process;

use log::{error, info, warn};
use structopt::StructOpt;

use mptrie::config::{Config, EngineKind};
use mptrie::init_logger;
use mptrie::Trie;

#[derive(Debug, StructOpt)]
#[structopt(name = "mptrie", about = "Merkle Patricia Trie tool")]
enum Opt {
    /// Apply a script of trie operations and print the root hash
    ///
    /// One operation per line: `put <key> [value]`, `get <key>`,
    /// `delete <key>` or `hash`, with keys and values in hex. Lines starting
    /// with `#` are ignored.
    Run {
        /// Script file (stdin when omitted)
        #[structopt(parse(from_os_str))]
        script: Option<PathBuf>,

        /// Config file
        #[structopt(long, parse(from_os_str))]
        config: Option<PathBuf>,

        /// Engine override (patricia, sorted_map)
        #[structopt(long)]
        engine: Option<String>,

        /// Print the canonical root encoding
        #[structopt(long)]
        serialize: bool,
    },

    /// Write a default configuration file
    GenConfig {
        /// Output file
        #[structopt(parse(from_os_str))]
        output: PathBuf,
    },
}

/// A single scripted operation
#[derive(Debug, Clone, PartialEq, Eq)]
enum Op {
    Put(Vec<u8>, Vec<u8>),
    Get(Vec<u8>),
    Delete(Vec<u8>),
    Hash,
}

fn decode_hex(field: &str, line_no: usize) -> Result<Vec<u8>, String> {
    hex::decode(field.trim_start_matches("0x"))
        .map_err(|e| format!("line {}: invalid hex {:?}: {}", line_no, field, e))
}

fn parse_script(script: &str) -> Result<Vec<Op>, String> {
    let mut ops = Vec::new();

    for (i, line) in script.lines().enumerate() {
        let line_no = i + 1;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let fields: Vec<&str> = line.split_whitespace().collect();
        let op = match fields.as_slice() {
            ["put", key] => Op::Put(decode_hex(key, line_no)?, Vec::new()),
            ["put", key, value] => Op::Put(decode_hex(key, line_no)?, decode_hex(value, line_no)?),
            ["get", key] => Op::Get(decode_hex(key, line_no)?),
            ["delete", key] => Op::Delete(decode_hex(key, line_no)?),
            ["hash"] => Op::Hash,
            _ => return Err(format!("line {}: unrecognized operation {:?}", line_no, line)),
        };
        ops.push(op);
    }

    Ok(ops)
}

fn apply(trie: &mut dyn Trie, ops: &[Op]) -> Result<(), String> {
    for op in ops {
        match op {
            Op::Put(key, value) => trie
                .put(key, value)
                .map_err(|e| format!("put {}: {}", hex::encode(key), e))?,
            Op::Get(key) => match trie.get(key) {
                Ok(value) => println!("{} = {}", hex::encode(key), hex::encode(value)),
                Err(e) if e.is_not_found() => println!("{} not found", hex::encode(key)),
                Err(e) => return Err(format!("get {}: {}", hex::encode(key), e)),
            },
            Op::Delete(key) => match trie.delete(key) {
                Ok(()) => {}
                Err(e) if e.is_not_found() => println!("{} not found", hex::encode(key)),
                Err(e) if e.is_not_supported() => warn!("delete {}: {}", hex::encode(key), e),
                Err(e) => return Err(format!("delete {}: {}", hex::encode(key), e)),
            },
            Op::Hash => println!("hash {}", trie.hash()),
        }
    }
    Ok(())
}

fn run(
    script: Option<PathBuf>,
    config: Option<PathBuf>,
    engine: Option<String>,
    serialize: bool,
) -> Result<(), String> {
    let mut config = match config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };

    if let Some(engine) = engine {
        config.trie.engine = match engine.as_str() {
            "patricia" => EngineKind::Patricia,
            "sorted_map" => EngineKind::SortedMap,
            other => return Err(format!("Unknown engine: {}", other)),
        };
    }

    let source = match script {
        Some(path) => fs::read_to_string(&path)
            .map_err(|e| format!("Failed to read script {:?}: {}", path, e))?,
        None => {
            let mut source = String::new();
            io::stdin()
                .read_to_string(&mut source)
                .map_err(|e| format!("Failed to read stdin: {}", e))?;
            source
        }
    };

    let ops = parse_script(&source)?;
    info!("Applying {} operations with the {:?} engine", ops.len(), config.trie.engine);

    let mut trie = config.trie.build_engine();
    apply(trie.as_mut(), &ops)?;

    println!("root {}", trie.hash());
    if serialize || config.cli.print_serialization {
        match trie.serialize() {
            Ok(encoded) => println!("serialized {}", hex::encode(encoded)),
            Err(e) => warn!("{}", e),
        }
    }

    Ok(())
}

fn main() {
    init_logger();

    let result = match Opt::from_args() {
        Opt::Run { script, config, engine, serialize } => run(script, config, engine, serialize),
        Opt::GenConfig { output } => Config::generate_default(output),
    };

    if let Err(e) = result {
        error!("{}", e);
        eprintln!("error: {}", e);
        process::exit(1);
    }
}
