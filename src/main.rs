// This is the entry point for the node binary
// Every command opens the chain database in the data directory, does one thing
// and prints JSON so other tools can read the output
use cascade_chain::{
    AddressBook, ChainStore, Command, CoinProof, Hash, Ledger, Opt, StandardScripts, TxPoW,
    GLOBAL_CONFIG,
};
use clap::Parser;
use data_encoding::HEXLOWER;
use log::{error, LevelFilter};
use serde::Serialize;
use std::fs;
use std::path::Path;
use std::process;
use std::sync::Arc;

fn main() {
    // I keep Info as the default level so applied blocks and cascades show up
    env_logger::builder().filter_level(LevelFilter::Info).init();

    let opt = Opt::parse();

    // Command line flags win over the environment
    if let Some(dir) = &opt.data_dir {
        GLOBAL_CONFIG.set_data_dir(dir.display().to_string());
    }
    if let Some(network) = opt.network {
        GLOBAL_CONFIG.set_network(network);
    }
    if let Some(file) = &opt.config {
        GLOBAL_CONFIG.set_config_file(file.display().to_string());
    }

    if let Err(e) = run_command(opt.command) {
        error!("Error: {e}");
        process::exit(1);
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

// I read encoded units as hex text so they can be passed around by hand
fn read_hex_txpow(file: &Path) -> Result<TxPoW, Box<dyn std::error::Error>> {
    let text = fs::read_to_string(file)?;
    let bytes = HEXLOWER.decode(text.trim().to_lowercase().as_bytes())?;
    Ok(cascade_chain::utils::deserialize(&bytes)?)
}

fn open_book(data_dir: &Path) -> Result<Arc<AddressBook>, Box<dyn std::error::Error>> {
    fs::create_dir_all(data_dir)?;
    Ok(Arc::new(AddressBook::open_in(data_dir)?))
}

fn open_ledger() -> Result<Ledger, Box<dyn std::error::Error>> {
    let data_dir = GLOBAL_CONFIG.get_data_dir();
    let book = open_book(&data_dir)?;
    let store = ChainStore::open(&data_dir.join("chain"))?;
    Ok(Ledger::open(store, Arc::new(StandardScripts), book)?)
}

fn run_command(command: Command) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        Command::Createchain => {
            let data_dir = GLOBAL_CONFIG.get_data_dir();
            let params = GLOBAL_CONFIG.load_params()?;
            let book = open_book(&data_dir)?;
            let store = ChainStore::open(&data_dir.join("chain"))?;
            let ledger = Ledger::create(params, Some(store), Arc::new(StandardScripts), book)?;
            print_json(&ledger.status()?)?;
        }
        Command::Createwallet => {
            let book = open_book(&GLOBAL_CONFIG.get_data_dir())?;
            let address = book.create_wallet()?;
            println!("Your new address: {address}");
        }
        Command::Watch { address } => {
            let address: Hash = address.parse()?;
            open_book(&GLOBAL_CONFIG.get_data_dir())?.watch(address)?;
            println!("Watching {address}");
        }
        Command::ListAddresses => {
            let book = open_book(&GLOBAL_CONFIG.get_data_dir())?;
            for address in book.get_addresses() {
                println!("{address}");
            }
        }
        Command::Status => {
            print_json(&open_ledger()?.status()?)?;
        }
        Command::Printchain => {
            // I print the headers newest first, the same order the tree walks them
            let chain = open_ledger()?.main_chain()?;
            let headers: Vec<_> = chain
                .iter()
                .map(|info| {
                    serde_json::json!({
                        "id": info.id,
                        "status": info.status,
                        "total_weight": info.total_weight.to_string(),
                        "header": info.header,
                    })
                })
                .collect();
            print_json(&headers)?;
        }
        Command::Magic => {
            let tip = open_ledger()?.tip()?;
            print_json(tip.header.magic())?;
        }
        Command::Coins => {
            print_json(&open_ledger()?.relevant_coins()?)?;
        }
        Command::Exportcoin { coin_id } => {
            let coin_id: Hash = coin_id.parse()?;
            print_json(&open_ledger()?.coin_proof(&coin_id)?)?;
        }
        Command::Checkcoin { file } => {
            let proof: CoinProof = serde_json::from_str(&fs::read_to_string(file)?)?;
            let valid = open_ledger()?.check_coin_proof(&proof)?;
            print_json(&serde_json::json!({
                "coin_id": proof.coin().coin_id(),
                "valid": valid,
            }))?;
        }
        Command::Importblock { file } => {
            let txpow = read_hex_txpow(&file)?;
            let outcome = open_ledger()?.apply_block(txpow)?;
            print_json(&serde_json::json!({
                "id": outcome.id,
                "block_number": outcome.block_number,
                "coins": outcome.notifications,
                "reorg": outcome.reorg,
                "cascaded": outcome.cascaded,
            }))?;
        }
        Command::Importtxn { file } => {
            let txpow = read_hex_txpow(&file)?;
            let id = open_ledger()?.add_txn(txpow)?;
            println!("Stored transaction unit {id}");
        }
        Command::Summary => {
            print_json(&open_ledger()?.chain_summary()?)?;
        }
    }
    Ok(())
}
