use serde::{Deserialize, Serialize};
use shroud_crypto::ENCRYPTION_OVERHEAD;

/// How a file is cut into independently encrypted blocks and grouped
/// into parts for transfer.
///
/// Sizes "on fs" are the encrypted sizes stored by the node: every block
/// grows by `overhead` bytes. The last block and part may be short, and an
/// empty file still has one (empty) block.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlockLayout {
    pub block_size: u64,
    pub blocks_per_part: u64,
    pub overhead: u64,
}

impl Default for BlockLayout {
    fn default() -> Self {
        Self {
            block_size: 64 * 1024,
            blocks_per_part: 80,
            overhead: ENCRYPTION_OVERHEAD as u64,
        }
    }
}

impl BlockLayout {
    pub fn block_size_on_fs(&self) -> u64 {
        self.block_size + self.overhead
    }

    pub fn part_size(&self) -> u64 {
        self.block_size * self.blocks_per_part
    }

    pub fn part_size_on_fs(&self) -> u64 {
        self.block_size_on_fs() * self.blocks_per_part
    }

    pub fn number_of_blocks(&self, size: u64) -> u64 {
        if size == 0 {
            1
        } else {
            size.div_ceil(self.block_size)
        }
    }

    pub fn size_on_fs(&self, size: u64) -> u64 {
        size + self.number_of_blocks(size) * self.overhead
    }

    pub fn number_of_parts(&self, size: u64) -> u64 {
        self.size_on_fs(size).div_ceil(self.part_size_on_fs())
    }

    /// Plaintext length of block `index`.
    pub fn block_len(&self, size: u64, index: u64) -> u64 {
        size.saturating_sub(index * self.block_size).min(self.block_size)
    }

    /// Half-open byte range of part `index` in the stored file.
    pub fn part_range(&self, size: u64, index: u64) -> (u64, u64) {
        let size_on_fs = self.size_on_fs(size);
        let start = (index * self.part_size_on_fs()).min(size_on_fs);
        let end = (start + self.part_size_on_fs()).min(size_on_fs);
        (start, end)
    }

    /// Whether block `index` is the last one of its part.
    pub fn closes_part(&self, size: u64, index: u64) -> bool {
        (index + 1) % self.blocks_per_part == 0 || index + 1 == self.number_of_blocks(size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small() -> BlockLayout {
        BlockLayout {
            block_size: 10,
            blocks_per_part: 3,
            overhead: 2,
        }
    }

    #[test]
    fn empty_file_has_one_block_and_part() {
        let layout = small();
        assert_eq!(layout.number_of_blocks(0), 1);
        assert_eq!(layout.size_on_fs(0), 2);
        assert_eq!(layout.number_of_parts(0), 1);
        assert_eq!(layout.part_range(0, 0), (0, 2));
        assert_eq!(layout.block_len(0, 0), 0);
    }

    #[test]
    fn boundaries() {
        let layout = small();
        assert_eq!(layout.number_of_blocks(10), 1);
        assert_eq!(layout.number_of_blocks(11), 2);
        assert_eq!(layout.size_on_fs(30), 36);
        assert_eq!(layout.number_of_parts(30), 1);
        assert_eq!(layout.number_of_parts(31), 2);
        assert_eq!(layout.part_range(31, 1), (36, 39));
        assert_eq!(layout.block_len(31, 3), 1);
    }

    #[test]
    fn part_closing_blocks() {
        let layout = small();
        assert!(!layout.closes_part(70, 1));
        assert!(layout.closes_part(70, 2));
        assert!(layout.closes_part(70, 6));
        assert!(layout.closes_part(0, 0));
    }

    #[test]
    fn default_matches_storage_node() {
        let layout = BlockLayout::default();
        assert_eq!(layout.block_size_on_fs(), 65536 + 28);
        assert_eq!(layout.part_size(), 80 * 65536);
    }
}
