use std::sync::{Arc, OnceLock};

use crate::{
    bb::{BbCipher, BbKeyTable, BbSeed},
    CryptoError, CryptoResult, PsoCipher, BB_BLOCK_LEN,
};

/// State shared between a detector and the imitators that follow it: the
/// candidate key tables and, once the first client frame has been seen, the
/// index of the table the client actually uses.
#[derive(Debug)]
pub struct SharedDetectorState {
    candidates: Vec<Arc<BbKeyTable>>,
    locked: OnceLock<usize>,
}

impl SharedDetectorState {
    pub fn new(candidates: Vec<Arc<BbKeyTable>>) -> Arc<Self> {
        Arc::new(Self {
            candidates,
            locked: OnceLock::new(),
        })
    }

    pub fn locked_table(&self) -> Option<Arc<BbKeyTable>> {
        self.locked.get().map(|&i| self.candidates[i].clone())
    }
}

/// Latter-game client-to-proxy cipher for the case where the client's key
/// variant is unknown. On the first decrypt it probes every candidate table
/// against the known plaintext of the client's first frame (the login header)
/// and locks in the one that reproduces it; afterwards it behaves like a
/// plain cipher. Errors if no candidate matches.
pub struct MultiKeyDetector {
    shared: Arc<SharedDetectorState>,
    seed: BbSeed,
    expected_first: Vec<u8>,
    inner: Option<BbCipher>,
}

impl MultiKeyDetector {
    pub fn new(
        shared: Arc<SharedDetectorState>,
        expected_first: Vec<u8>,
        seed: BbSeed,
    ) -> Self {
        debug_assert!(expected_first.len() % BB_BLOCK_LEN == 0);
        Self {
            shared,
            seed,
            expected_first,
            inner: None,
        }
    }

    pub fn shared(&self) -> Arc<SharedDetectorState> {
        self.shared.clone()
    }

    fn lock(&mut self, data: &[u8]) -> CryptoResult<BbCipher> {
        let probe_len = self.expected_first.len().min(data.len());
        for (index, table) in self.shared.candidates.iter().enumerate() {
            let mut candidate = BbCipher::new(table.clone(), &self.seed);
            let mut probe = data[..probe_len].to_vec();
            candidate.decrypt(&mut probe)?;
            if probe == self.expected_first[..probe_len] {
                let _ = self.shared.locked.set(index);
                // Redo the probe bytes on a fresh cipher so its stream
                // position matches the start of the connection.
                return Ok(BbCipher::new(table.clone(), &self.seed));
            }
        }
        Err(CryptoError::NoMatchingKey)
    }
}

impl PsoCipher for MultiKeyDetector {
    fn block_size(&self) -> usize {
        BB_BLOCK_LEN
    }

    fn encrypt(&mut self, data: &mut [u8]) -> CryptoResult<()> {
        match self.inner.as_mut() {
            Some(c) => c.encrypt(data),
            None => Err(CryptoError::DetectorNotLocked),
        }
    }

    fn decrypt(&mut self, data: &mut [u8]) -> CryptoResult<()> {
        if self.inner.is_none() {
            let cipher = self.lock(data)?;
            self.inner = Some(cipher);
        }
        self.inner.as_mut().unwrap().decrypt(data)
    }
}

/// Cipher on a direction paired with a detector. It defers key selection to
/// the detector and initializes from the detector's locked table with its own
/// seed; using it before the detector has seen the client's first frame is
/// an error, which the channel layer turns into a disconnect.
pub struct MultiKeyImitator {
    shared: Arc<SharedDetectorState>,
    seed: BbSeed,
    inner: Option<BbCipher>,
}

impl MultiKeyImitator {
    pub fn new(shared: Arc<SharedDetectorState>, seed: BbSeed) -> Self {
        Self {
            shared,
            seed,
            inner: None,
        }
    }

    fn cipher(&mut self) -> CryptoResult<&mut BbCipher> {
        if self.inner.is_none() {
            let table = self
                .shared
                .locked_table()
                .ok_or(CryptoError::DetectorNotLocked)?;
            self.inner = Some(BbCipher::new(table, &self.seed));
        }
        Ok(self.inner.as_mut().unwrap())
    }
}

impl PsoCipher for MultiKeyImitator {
    fn block_size(&self) -> usize {
        BB_BLOCK_LEN
    }

    fn encrypt(&mut self, data: &mut [u8]) -> CryptoResult<()> {
        self.cipher()?.encrypt(data)
    }

    fn decrypt(&mut self, data: &mut [u8]) -> CryptoResult<()> {
        self.cipher()?.decrypt(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bb::tests::{test_seed, test_table};

    const FIRST_FRAME: [u8; 8] = [0xB4, 0x00, 0x93, 0x00, 0x00, 0x00, 0x00, 0x00];

    #[test]
    fn detector_locks_matching_candidate() {
        let tables = vec![test_table(1), test_table(2), test_table(3)];
        let seed = test_seed(7);

        // The client encrypts with the second candidate.
        let mut client = BbCipher::new(tables[1].clone(), &seed);
        let mut wire = FIRST_FRAME;
        client.encrypt(&mut wire).unwrap();

        let shared = SharedDetectorState::new(tables.clone());
        let mut detector = MultiKeyDetector::new(shared.clone(), FIRST_FRAME.to_vec(), seed);
        detector.decrypt(&mut wire).unwrap();
        assert_eq!(wire, FIRST_FRAME);
        assert_eq!(shared.locked_table().unwrap(), tables[1]);
    }

    #[test]
    fn detector_errors_without_match() {
        let seed = test_seed(7);
        let mut client = BbCipher::new(test_table(9), &seed);
        let mut wire = FIRST_FRAME;
        client.encrypt(&mut wire).unwrap();

        let shared = SharedDetectorState::new(vec![test_table(1), test_table(2)]);
        let mut detector = MultiKeyDetector::new(shared, FIRST_FRAME.to_vec(), seed);
        assert!(matches!(
            detector.decrypt(&mut wire),
            Err(CryptoError::NoMatchingKey)
        ));
    }

    #[test]
    fn imitator_follows_detector() {
        let tables = vec![test_table(1), test_table(2)];
        let client_seed = test_seed(7);
        let server_seed = test_seed(11);

        let mut client = BbCipher::new(tables[0].clone(), &client_seed);
        let mut wire = FIRST_FRAME;
        client.encrypt(&mut wire).unwrap();

        let shared = SharedDetectorState::new(tables.clone());
        let mut imitator = MultiKeyImitator::new(shared.clone(), server_seed);

        // Before the detector locks, the imitator refuses to run.
        let mut buf = [0u8; 8];
        assert!(matches!(
            imitator.encrypt(&mut buf),
            Err(CryptoError::DetectorNotLocked)
        ));

        let mut detector = MultiKeyDetector::new(shared, FIRST_FRAME.to_vec(), client_seed);
        detector.decrypt(&mut wire).unwrap();

        // After lock, the imitator pairs with a plain cipher using the same
        // table and its own seed.
        let mut peer = BbCipher::new(tables[0].clone(), &server_seed);
        let data = [0x11u8; 16];
        let mut enc = data;
        imitator.encrypt(&mut enc).unwrap();
        peer.decrypt(&mut enc).unwrap();
        assert_eq!(enc, data);
    }
}
