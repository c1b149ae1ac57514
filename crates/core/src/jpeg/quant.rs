//! Fixed-capacity storage for DQT quantization tables.

/// Number of table slots. Baseline JPEG defines at most four table
/// destinations, and the RTP/JPEG payload only ever carries two of them.
pub const MAX_TABLES: usize = 4;

/// Largest table, in bytes (64 sixteen-bit coefficients).
pub const MAX_TABLE_LEN: usize = 128;

/// Table id 15 is reserved; the 4-bit `Tq` field accepts 0..=14.
const INVALID_TABLE_ID: u8 = 15;

/// Coefficient precision of one quantization table (the DQT `Pq` nibble).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Precision {
    /// 8-bit coefficients, 64 bytes per table.
    Eight,
    /// 16-bit coefficients, 128 bytes per table.
    Sixteen,
}

impl Precision {
    /// Decode the high nibble of a DQT `Pq/Tq` byte. Any nonzero value is
    /// treated as 16-bit.
    pub fn from_nibble(pq: u8) -> Self {
        if pq == 0 { Self::Eight } else { Self::Sixteen }
    }

    /// Table length in bytes.
    pub fn table_len(self) -> usize {
        match self {
            Self::Eight => 64,
            Self::Sixteen => 128,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum QuantTableError {
    #[error("quantization table id {0} is reserved")]
    InvalidId(u8),
    #[error("no free slot for quantization table {0}")]
    Full(u8),
    #[error("quantization table {id} needs {expected} bytes, got {actual}")]
    WrongLength {
        id: u8,
        expected: usize,
        actual: usize,
    },
}

/// One quantization table as it appeared in the stream, in zig-zag order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuantTable {
    id: u8,
    precision: Precision,
    values: [u8; MAX_TABLE_LEN],
}

impl QuantTable {
    pub fn id(&self) -> u8 {
        self.id
    }

    pub fn precision(&self) -> Precision {
        self.precision
    }

    /// Raw table bytes: 64 for 8-bit tables, 128 for 16-bit ones.
    pub fn bytes(&self) -> &[u8] {
        &self.values[..self.precision.table_len()]
    }
}

/// Mapping from table id to table bytes with room for [`MAX_TABLES`]
/// distinct ids and no heap allocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QuantizationTables {
    slots: [Option<QuantTable>; MAX_TABLES],
}

impl QuantizationTables {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a table under `id`, replacing any table already stored there.
    pub fn insert(
        &mut self,
        id: u8,
        precision: Precision,
        bytes: &[u8],
    ) -> Result<(), QuantTableError> {
        if id >= INVALID_TABLE_ID {
            return Err(QuantTableError::InvalidId(id));
        }
        let expected = precision.table_len();
        if bytes.len() != expected {
            return Err(QuantTableError::WrongLength {
                id,
                expected,
                actual: bytes.len(),
            });
        }

        let slot = match self.position(id) {
            Some(pos) => pos,
            None => self
                .slots
                .iter()
                .position(Option::is_none)
                .ok_or(QuantTableError::Full(id))?,
        };

        let mut values = [0u8; MAX_TABLE_LEN];
        values[..expected].copy_from_slice(bytes);
        self.slots[slot] = Some(QuantTable {
            id,
            precision,
            values,
        });
        Ok(())
    }

    pub fn get(&self, id: u8) -> Option<&QuantTable> {
        self.position(id).and_then(|pos| self.slots[pos].as_ref())
    }

    /// Stored tables in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &QuantTable> {
        self.slots.iter().flatten()
    }

    pub fn len(&self) -> usize {
        self.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(Option::is_none)
    }

    /// Whether any stored table uses 16-bit coefficients.
    pub fn has_sixteen_bit(&self) -> bool {
        self.iter().any(|t| t.precision == Precision::Sixteen)
    }

    fn position(&self, id: u8) -> Option<usize> {
        self.slots
            .iter()
            .position(|slot| slot.as_ref().is_some_and(|t| t.id == id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_and_get() {
        let mut tables = QuantizationTables::new();
        let luma: Vec<u8> = (0..64).collect();
        tables.insert(0, Precision::Eight, &luma).unwrap();

        let t = tables.get(0).unwrap();
        assert_eq!(t.bytes(), luma.as_slice());
        assert_eq!(t.precision(), Precision::Eight);
        assert!(tables.get(1).is_none());
    }

    #[test]
    fn reserved_id_rejected() {
        let mut tables = QuantizationTables::new();
        assert_eq!(
            tables.insert(15, Precision::Eight, &[1; 64]),
            Err(QuantTableError::InvalidId(15))
        );
        assert!(tables.is_empty());
    }

    #[test]
    fn id_14_is_valid() {
        let mut tables = QuantizationTables::new();
        tables.insert(14, Precision::Eight, &[1; 64]).unwrap();
        assert_eq!(tables.get(14).unwrap().id(), 14);
    }

    #[test]
    fn reinsert_replaces() {
        let mut tables = QuantizationTables::new();
        tables.insert(1, Precision::Eight, &[1; 64]).unwrap();
        tables.insert(1, Precision::Sixteen, &[2; 128]).unwrap();
        assert_eq!(tables.len(), 1);
        assert_eq!(tables.get(1).unwrap().bytes(), &[2u8; 128][..]);
        assert!(tables.has_sixteen_bit());
    }

    #[test]
    fn capacity_is_bounded() {
        let mut tables = QuantizationTables::new();
        for id in 0..MAX_TABLES as u8 {
            tables.insert(id, Precision::Eight, &[id; 64]).unwrap();
        }
        assert_eq!(
            tables.insert(9, Precision::Eight, &[9; 64]),
            Err(QuantTableError::Full(9))
        );
        // Replacing an existing id still works when full.
        tables.insert(2, Precision::Eight, &[7; 64]).unwrap();
        assert_eq!(tables.get(2).unwrap().bytes()[0], 7);
    }

    #[test]
    fn length_must_match_precision() {
        let mut tables = QuantizationTables::new();
        assert!(matches!(
            tables.insert(0, Precision::Sixteen, &[0; 64]),
            Err(QuantTableError::WrongLength { expected: 128, .. })
        ));
    }
}
