use crate::config::Network;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "cascade-chain", about = "UTXO ledger with cascading finality")]
pub struct Opt {
    #[arg(long = "data-dir", global = true, help = "Directory holding the chain database")]
    pub data_dir: Option<PathBuf>,
    #[arg(long = "network", global = true, help = "mainnet, testnet or devnet")]
    pub network: Option<Network>,
    #[arg(long = "config", global = true, help = "TOML file overriding chain parameters")]
    pub config: Option<PathBuf>,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    #[command(name = "createchain", about = "Create a new chain from its genesis block")]
    Createchain,
    #[command(name = "createwallet", about = "Create a new key and track its coins")]
    Createwallet,
    #[command(name = "watch", about = "Track coins sent to an address")]
    Watch {
        #[arg(help = "The address, 0x prefixed hex")]
        address: String,
    },
    #[command(name = "listaddresses", about = "Print the addresses being tracked")]
    ListAddresses,
    #[command(name = "status", about = "Print tip, root and cascade status")]
    Status,
    #[command(name = "printchain", about = "Print main chain headers from tip to root")]
    Printchain,
    #[command(name = "magic", about = "Print the adaptive parameters at the tip")]
    Magic,
    #[command(name = "coins", about = "Print tracked coins unspent at the tip")]
    Coins,
    #[command(name = "exportcoin", about = "Print a coin with its MMR proof")]
    Exportcoin {
        #[arg(help = "The coin id, 0x prefixed hex")]
        coin_id: String,
    },
    #[command(name = "checkcoin", about = "Check an exported coin proof against the tip")]
    Checkcoin {
        #[arg(help = "File holding the JSON printed by exportcoin")]
        file: PathBuf,
    },
    #[command(name = "importblock", about = "Validate and apply an encoded block")]
    Importblock {
        #[arg(help = "File holding the hex encoded block")]
        file: PathBuf,
    },
    #[command(name = "importtxn", about = "Store a transaction unit blocks may reference")]
    Importtxn {
        #[arg(help = "File holding the hex encoded unit")]
        file: PathBuf,
    },
    #[command(name = "summary", about = "Print the main chain ids for sync")]
    Summary,
}
