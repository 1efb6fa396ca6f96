use bitflags::bitflags;

bitflags! {
    /// Role of a page, stored in the opaque trailer of every index page.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct PageFlags: u16 {
        const META    = 1 << 0;
        const DELETED = 1 << 1;
        const DATA    = 1 << 2;
    }
}

bitflags! {
    /// State bits kept in the metapage.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct MetaFlags: u8 {
        /// Set by the last write of a successful build.
        const BUILD_COMPLETE = 1 << 0;
    }
}

bitflags! {
    /// Position of a posting fragment within its logical record.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct FragmentFlags: u8 {
        const FIRST = 1 << 0;
        const LAST  = 1 << 1;
    }
}
