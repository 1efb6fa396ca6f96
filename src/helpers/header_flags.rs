use bitflags::bitflags;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct HeaderFlags: u16 {
        /// Header checksum is enabled and must be validated
        const CHECKSUM_ENABLED = 0b0000_0001;

        /// Page writes go through the full-page-image redo journal
        const REDO_JOURNAL     = 0b0000_0010;
    }
}
