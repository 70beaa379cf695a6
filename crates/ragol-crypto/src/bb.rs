use std::sync::Arc;

use crate::{check_aligned, CryptoError, CryptoResult, PsoCipher, BB_BLOCK_LEN};

/// Seed length carried in the latter-game server-init frame.
pub const BB_SEED_LEN: usize = 48;
/// Size of a latter-game key table on disk.
pub const BB_KEY_TABLE_LEN: usize = 1024;

const ROUNDS: usize = 8;
const TABLE_WORDS: usize = BB_KEY_TABLE_LEN / 4;

pub type BbSeed = [u8; BB_SEED_LEN];

/// A 1024-byte key table. Loaded once per key variant and shared between all
/// ciphers derived from it; third-party clients ship with differing tables,
/// which is what the multi-key detector discriminates between.
#[derive(Clone, PartialEq, Eq)]
pub struct BbKeyTable {
    words: [u32; TABLE_WORDS],
}

impl std::fmt::Debug for BbKeyTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BbKeyTable").finish_non_exhaustive()
    }
}

impl BbKeyTable {
    pub fn from_bytes(data: &[u8]) -> CryptoResult<Self> {
        if data.len() != BB_KEY_TABLE_LEN {
            return Err(CryptoError::BadKeyTable(BB_KEY_TABLE_LEN));
        }
        let mut words = [0u32; TABLE_WORDS];
        for (word, chunk) in words.iter_mut().zip(data.chunks_exact(4)) {
            *word = u32::from_le_bytes(chunk.try_into().unwrap());
        }
        Ok(Self { words })
    }
}

/// Cipher used by the latter-game clients: an 8-round Feistel network over
/// 8-byte blocks. The round keys are scheduled from the connection seed and
/// the shared key table; the table itself doubles as the S-box.
#[derive(Clone)]
pub struct BbCipher {
    table: Arc<BbKeyTable>,
    round_keys: [u32; ROUNDS + 2],
}

impl BbCipher {
    pub fn new(table: Arc<BbKeyTable>, seed: &BbSeed) -> Self {
        let mut round_keys = [0u32; ROUNDS + 2];
        let seed_words: Vec<u32> = seed
            .chunks_exact(4)
            .map(|c| u32::from_le_bytes(c.try_into().unwrap()))
            .collect();

        for (i, key) in round_keys.iter_mut().enumerate() {
            *key = table.words[i] ^ seed_words[i % seed_words.len()];
        }

        // Run the schedule through the cipher itself so every round key
        // depends on the whole seed, not just one seed word.
        let mut cipher = Self { table, round_keys };
        let (mut l, mut r) = (0u32, 0u32);
        for i in (0..ROUNDS + 2).step_by(2) {
            (l, r) = cipher.encrypt_block(l, r);
            cipher.round_keys[i] = l;
            if i + 1 < ROUNDS + 2 {
                cipher.round_keys[i + 1] = r;
            }
        }
        cipher
    }

    fn feistel(&self, x: u32) -> u32 {
        let t = &self.table.words;
        let a = t[(x >> 24) as usize & 0xFF];
        let b = t[(x >> 16) as usize & 0xFF];
        let c = t[(x >> 8) as usize & 0xFF];
        let d = t[x as usize & 0xFF];
        a.wrapping_add(b) ^ c.wrapping_add(d)
    }

    fn encrypt_block(&self, mut l: u32, mut r: u32) -> (u32, u32) {
        for i in 0..ROUNDS {
            l ^= self.round_keys[i];
            r ^= self.feistel(l);
            std::mem::swap(&mut l, &mut r);
        }
        std::mem::swap(&mut l, &mut r);
        (l ^ self.round_keys[ROUNDS], r ^ self.round_keys[ROUNDS + 1])
    }

    fn decrypt_block(&self, l: u32, r: u32) -> (u32, u32) {
        let (mut l, mut r) = (l ^ self.round_keys[ROUNDS], r ^ self.round_keys[ROUNDS + 1]);
        std::mem::swap(&mut l, &mut r);
        for i in (0..ROUNDS).rev() {
            std::mem::swap(&mut l, &mut r);
            r ^= self.feistel(l);
            l ^= self.round_keys[i];
        }
        (l, r)
    }

    fn apply(&mut self, data: &mut [u8], encrypt: bool) -> CryptoResult<()> {
        check_aligned(data.len(), BB_BLOCK_LEN)?;
        for block in data.chunks_exact_mut(BB_BLOCK_LEN) {
            let l = u32::from_le_bytes(block[..4].try_into().unwrap());
            let r = u32::from_le_bytes(block[4..].try_into().unwrap());
            let (l, r) = if encrypt {
                self.encrypt_block(l, r)
            } else {
                self.decrypt_block(l, r)
            };
            block[..4].copy_from_slice(&l.to_le_bytes());
            block[4..].copy_from_slice(&r.to_le_bytes());
        }
        Ok(())
    }
}

impl PsoCipher for BbCipher {
    fn block_size(&self) -> usize {
        BB_BLOCK_LEN
    }

    fn encrypt(&mut self, data: &mut [u8]) -> CryptoResult<()> {
        self.apply(data, true)
    }

    fn decrypt(&mut self, data: &mut [u8]) -> CryptoResult<()> {
        self.apply(data, false)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn test_table(fill: u32) -> Arc<BbKeyTable> {
        let mut words = [0u32; TABLE_WORDS];
        let mut v = fill | 1;
        for w in words.iter_mut() {
            v = v.wrapping_mul(0x0001_9660D).wrapping_add(0x3C6E_F35F);
            *w = v;
        }
        Arc::new(BbKeyTable { words })
    }

    pub(crate) fn test_seed(fill: u8) -> BbSeed {
        let mut seed = [0u8; BB_SEED_LEN];
        for (i, b) in seed.iter_mut().enumerate() {
            *b = fill.wrapping_add(i as u8);
        }
        seed
    }

    #[test]
    fn en_dec() {
        let table = test_table(5);
        let seed = test_seed(9);
        let mut enc = BbCipher::new(table.clone(), &seed);
        let mut dec = BbCipher::new(table, &seed);

        let data = [0x5Au8; 64];
        let mut buf = data;
        enc.encrypt(&mut buf).unwrap();
        assert_ne!(buf, data);
        dec.decrypt(&mut buf).unwrap();
        assert_eq!(buf, data);
    }

    #[test]
    fn table_discriminates() {
        let seed = test_seed(1);
        let mut a = BbCipher::new(test_table(1), &seed);
        let mut b = BbCipher::new(test_table(2), &seed);

        let mut buf_a = [0u8; 8];
        let mut buf_b = [0u8; 8];
        a.encrypt(&mut buf_a).unwrap();
        b.encrypt(&mut buf_b).unwrap();
        assert_ne!(buf_a, buf_b);
    }

    #[test]
    fn rejects_unaligned() {
        let mut c = BbCipher::new(test_table(3), &test_seed(3));
        let mut buf = [0u8; 12];
        assert!(c.encrypt(&mut buf).is_err());
    }

    #[test]
    fn rejects_short_table() {
        assert!(BbKeyTable::from_bytes(&[0u8; 100]).is_err());
    }
}
