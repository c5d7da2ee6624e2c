use crate::core::{Coin, Hash};
use crate::error::Result;
use crate::utils::{deserialize, serialize};
use crate::wallet::{Wallet, WalletView};
use std::collections::{HashMap, HashSet};
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};

pub const WALLET_FILE: &str = "wallet.dat";

#[derive(Default, bincode::Encode, bincode::Decode)]
struct Book {
    wallets: HashMap<Hash, Wallet>,
    watched: HashSet<Hash>,
}

/// The node's own keys plus watch-only addresses. A coin is relevant when its
/// address is in the book.
#[derive(Default)]
pub struct AddressBook {
    inner: RwLock<Book>,
    path: Option<PathBuf>,
}

impl AddressBook {
    pub fn new() -> AddressBook {
        AddressBook::default()
    }

    /// Load the book kept at `path`, or start an empty one there
    pub fn open(path: &Path) -> Result<AddressBook> {
        let book = if path.exists() {
            let mut file = File::open(path)?;
            let mut buf = Vec::new();
            file.read_to_end(&mut buf)?;
            deserialize(&buf)?
        } else {
            Book::default()
        };
        Ok(AddressBook {
            inner: RwLock::new(book),
            path: Some(path.to_path_buf()),
        })
    }

    pub fn open_in(dir: &Path) -> Result<AddressBook> {
        AddressBook::open(&dir.join(WALLET_FILE))
    }

    pub fn create_wallet(&self) -> Result<Hash> {
        let wallet = Wallet::new()?;
        let address = wallet.address()?;
        {
            let mut book = self.inner.write().unwrap_or_else(PoisonError::into_inner);
            book.wallets.insert(address, wallet);
        }
        self.save()?;
        Ok(address)
    }

    pub fn watch(&self, address: Hash) -> Result<()> {
        {
            let mut book = self.inner.write().unwrap_or_else(PoisonError::into_inner);
            book.watched.insert(address);
        }
        self.save()
    }

    pub fn get_wallet(&self, address: &Hash) -> Option<Wallet> {
        let book = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        book.wallets.get(address).cloned()
    }

    pub fn get_addresses(&self) -> Vec<Hash> {
        let book = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        let mut addresses: Vec<Hash> = book
            .wallets
            .keys()
            .chain(book.watched.iter())
            .copied()
            .collect();
        addresses.sort();
        addresses.dedup();
        addresses
    }

    fn save(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let bytes = {
            let book = self.inner.read().unwrap_or_else(PoisonError::into_inner);
            serialize(&*book)?
        };
        let file = OpenOptions::new()
            .create(true)
            .truncate(true)
            .write(true)
            .open(path)?;
        let mut writer = BufWriter::new(file);
        writer.write_all(bytes.as_slice())?;
        writer.flush()?;
        Ok(())
    }
}

impl WalletView for AddressBook {
    fn is_relevant(&self, coin: &Coin) -> bool {
        let book = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        book.wallets.contains_key(coin.address()) || book.watched.contains(coin.address())
    }
}
