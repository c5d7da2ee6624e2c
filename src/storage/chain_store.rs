// I keep the whole chain in one sled database with three trees:
// - `txpow` holds every block and transaction unit by id
// - `meta` holds the chain parameters, the collapsed root and the cascade
// - `blocks` holds the ids of the blocks above the root, keyed by a
//   big-endian sequence number so iteration gives the order they were applied
// Reopening rebuilds the tree by replaying those blocks on top of the root.

use crate::chain::Cascade;
use crate::config::ChainParams;
use crate::core::mmr::MmrSnapshot;
use crate::core::{Coin, Hash, TxBlock, TxPoW};
use crate::error::{LedgerError, Result};
use crate::utils::{deserialize, serialize};
use log::debug;
use sled::transaction::TransactionError;
use sled::{Db, Transactional, Tree};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

const TXPOW_TREE: &str = "txpow";
const META_TREE: &str = "meta";
const BLOCKS_TREE: &str = "blocks";

const PARAMS_KEY: &str = "params";
const ROOT_KEY: &str = "root";
const CASCADE_KEY: &str = "cascade";

/// Everything needed to restart from the tree root
#[derive(Debug, Clone, PartialEq, Eq, bincode::Encode, bincode::Decode)]
pub struct RootSnapshot {
    pub txblock: TxBlock,
    pub mmr: MmrSnapshot,
    /// Relevant unspent coins as of the root
    pub coins: Vec<Coin>,
}

#[derive(Clone)]
pub struct ChainStore {
    db: Db,
    txpow: Tree,
    meta: Tree,
    blocks: Tree,
    path: PathBuf,
}

impl ChainStore {
    pub fn open(path: &Path) -> Result<ChainStore> {
        let db = sled::open(path)
            .map_err(|e| LedgerError::Database(format!("Failed to open database: {e}")))?;
        let txpow = db
            .open_tree(TXPOW_TREE)
            .map_err(|e| LedgerError::Database(format!("Failed to open txpow tree: {e}")))?;
        let meta = db
            .open_tree(META_TREE)
            .map_err(|e| LedgerError::Database(format!("Failed to open meta tree: {e}")))?;
        let blocks = db
            .open_tree(BLOCKS_TREE)
            .map_err(|e| LedgerError::Database(format!("Failed to open blocks tree: {e}")))?;
        Ok(ChainStore {
            db,
            txpow,
            meta,
            blocks,
            path: path.to_path_buf(),
        })
    }

    pub fn get_db_path(&self) -> &PathBuf {
        &self.path
    }

    /// True once a chain has been created here
    pub fn has_chain(&self) -> Result<bool> {
        Ok(self.meta.contains_key(ROOT_KEY)?)
    }

    pub fn put_txpow(&self, txpow: &TxPoW) -> Result<()> {
        let id = txpow.id()?;
        self.txpow.insert(id.as_bytes(), serialize(txpow)?)?;
        Ok(())
    }

    pub fn get_txpow(&self, id: &Hash) -> Result<Option<TxPoW>> {
        match self.txpow.get(id.as_bytes())? {
            Some(bytes) => Ok(Some(deserialize(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn remove_txpow(&self, id: &Hash) -> Result<()> {
        self.txpow.remove(id.as_bytes())?;
        Ok(())
    }

    /// Every stored block and unit
    pub fn load_txpows(&self) -> Result<Vec<TxPoW>> {
        self.txpow
            .iter()
            .values()
            .map(|bytes| deserialize(&bytes?))
            .collect()
    }

    pub fn txpow_count(&self) -> usize {
        self.txpow.len()
    }

    /// Parameters are stored as JSON so they can be read by hand
    pub fn save_params(&self, params: &ChainParams) -> Result<()> {
        let json = serde_json::to_vec(params)
            .map_err(|e| LedgerError::Serialization(format!("Failed to encode params: {e}")))?;
        self.meta.insert(PARAMS_KEY, json)?;
        Ok(())
    }

    pub fn load_params(&self) -> Result<Option<ChainParams>> {
        match self.meta.get(PARAMS_KEY)? {
            Some(bytes) => serde_json::from_slice(&bytes)
                .map(Some)
                .map_err(|e| LedgerError::Malformed(format!("Stored params unreadable: {e}"))),
            None => Ok(None),
        }
    }

    /// Replace the root and the cascade, and drop every block not in `keep`
    /// along with its id, in one transaction
    pub fn save_root(&self, root: &RootSnapshot, cascade: &Cascade, keep: &[Hash]) -> Result<()> {
        let root_bytes = serialize(root)?;
        let cascade_bytes = serialize(cascade)?;

        let keep: HashSet<&Hash> = keep.iter().collect();
        let mut dropped = Vec::new();
        for entry in self.blocks.iter() {
            let (key, value) = entry?;
            let id = Hash::from_slice(&value)?;
            if !keep.contains(&id) {
                dropped.push((key, id));
            }
        }

        (&self.meta, &self.blocks, &self.txpow)
            .transaction(|(meta, blocks, txpows)| {
                meta.insert(ROOT_KEY, root_bytes.as_slice())?;
                meta.insert(CASCADE_KEY, cascade_bytes.as_slice())?;
                for (key, id) in &dropped {
                    blocks.remove(key.clone())?;
                    txpows.remove(id.as_bytes())?;
                }
                Ok(())
            })
            .map_err(|e: TransactionError| LedgerError::Database(format!("Failed to save root: {e}")))?;
        self.db.flush()?;
        debug!(
            "Saved root snapshot, dropped {} blocks, {} left",
            dropped.len(),
            keep.len()
        );
        Ok(())
    }

    pub fn load_root(&self) -> Result<Option<RootSnapshot>> {
        match self.meta.get(ROOT_KEY)? {
            Some(bytes) => Ok(Some(deserialize(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn load_cascade(&self) -> Result<Cascade> {
        match self.meta.get(CASCADE_KEY)? {
            Some(bytes) => deserialize(&bytes),
            None => Ok(Cascade::new()),
        }
    }

    pub fn load_block_ids(&self) -> Result<Vec<Hash>> {
        self.blocks
            .iter()
            .values()
            .map(|value| Hash::from_slice(&value?))
            .collect()
    }

    /// Record a newly applied block. Only its own id is written, under the
    /// next sequence number. sled flushes it in the background and
    /// [`ChainStore::save_root`] flushes explicitly.
    pub fn append_block(&self, txpow: &TxPoW) -> Result<()> {
        let id = txpow.id()?;
        let bytes = serialize(txpow)?;
        let seq = self.db.generate_id()?;

        (&self.txpow, &self.blocks)
            .transaction(|(txpows, blocks)| {
                txpows.insert(id.as_bytes(), bytes.as_slice())?;
                blocks.insert(seq.to_be_bytes().to_vec(), id.as_bytes())?;
                Ok(())
            })
            .map_err(|e: TransactionError| {
                LedgerError::Database(format!("Failed to append block {id}: {e}"))
            })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Magic, MagicBounds, SuperParents, TxBody, TxHeader};
    use tempfile::tempdir;

    fn unit(number: u64) -> TxPoW {
        let header = TxHeader::new(
            3,
            number,
            0,
            Hash::MAX,
            SuperParents::genesis(8),
            Magic::genesis(&MagicBounds::default()),
        );
        TxPoW::new(header, TxBody::empty()).unwrap()
    }

    #[test]
    fn test_txpow_round_trip() {
        let dir = tempdir().unwrap();
        let store = ChainStore::open(dir.path()).unwrap();
        let txpow = unit(4);
        store.put_txpow(&txpow).unwrap();
        let id = txpow.id().unwrap();
        assert_eq!(store.get_txpow(&id).unwrap(), Some(txpow.clone()));
        assert_eq!(store.load_txpows().unwrap(), vec![txpow]);
        store.remove_txpow(&id).unwrap();
        assert_eq!(store.get_txpow(&id).unwrap(), None);
        assert_eq!(store.txpow_count(), 0);
    }

    #[test]
    fn test_params_and_block_list() {
        let dir = tempdir().unwrap();
        let store = ChainStore::open(dir.path()).unwrap();
        assert!(store.load_params().unwrap().is_none());
        assert!(!store.has_chain().unwrap());

        let params = ChainParams::devnet().unwrap();
        store.save_params(&params).unwrap();
        assert_eq!(store.load_params().unwrap(), Some(params));

        store.append_block(&unit(2)).unwrap();
        store.append_block(&unit(3)).unwrap();
        let ids = store.load_block_ids().unwrap();
        assert_eq!(ids, vec![unit(2).id().unwrap(), unit(3).id().unwrap()]);
        assert!(store.load_cascade().unwrap().is_empty());
    }

    #[test]
    fn test_save_root_drops_blocks_left_behind() {
        let dir = tempdir().unwrap();
        let store = ChainStore::open(dir.path()).unwrap();
        for n in 2..6 {
            store.append_block(&unit(n)).unwrap();
        }
        let root = unit(3);
        let (txblock, _) =
            TxBlock::build(&std::sync::Arc::new(crate::core::Mmr::new()), &root, &[]).unwrap();
        let snapshot = RootSnapshot {
            txblock,
            mmr: crate::core::Mmr::new().to_snapshot(),
            coins: Vec::new(),
        };
        let keep = vec![unit(4).id().unwrap(), unit(5).id().unwrap()];
        store.save_root(&snapshot, &Cascade::new(), &keep).unwrap();

        assert_eq!(store.load_block_ids().unwrap(), keep);
        assert!(store.get_txpow(&unit(2).id().unwrap()).unwrap().is_none());
        assert!(store.get_txpow(&unit(3).id().unwrap()).unwrap().is_none());
        assert_eq!(store.txpow_count(), 2);
        assert_eq!(store.load_root().unwrap(), Some(snapshot));
    }

    #[test]
    fn test_block_ids_keep_order_across_reopen() {
        let dir = tempdir().unwrap();
        let ids: Vec<Hash> = (2..7).map(|n| unit(n).id().unwrap()).collect();
        {
            let store = ChainStore::open(dir.path()).unwrap();
            for n in 2..7 {
                store.append_block(&unit(n)).unwrap();
            }
            store.db.flush().unwrap();
        }

        let store = ChainStore::open(dir.path()).unwrap();
        assert_eq!(store.load_block_ids().unwrap(), ids);
        for id in &ids {
            assert!(store.get_txpow(id).unwrap().is_some());
        }
        // more blocks after a restart still sort last
        store.append_block(&unit(7)).unwrap();
        assert_eq!(store.load_block_ids().unwrap().last(), Some(&unit(7).id().unwrap()));
    }
}
