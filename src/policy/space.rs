use crate::util::Address;

/// Identity of the space that served an allocation. Carried in successful
/// allocation results so callers can tell where an object landed without
/// consulting the address.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum SpaceKind {
    Young,
    Old,
    Code,
    Map,
    ReadOnly,
    SharedOld,
    SharedMap,
    YoungLarge,
    OldLarge,
    CodeLarge,
}

impl SpaceKind {
    /// Is this one of the large-object spaces?
    pub fn is_large(self) -> bool {
        matches!(
            self,
            SpaceKind::YoungLarge | SpaceKind::OldLarge | SpaceKind::CodeLarge
        )
    }
}

/// Common surface of every heap space. Spaces own their pages exclusively;
/// mutation happens through the space's own allocation entry points or
/// through its collection entry points, never both at once.
pub trait Space: Sync {
    fn kind(&self) -> SpaceKind;

    fn name(&self) -> &'static str;

    /// Does this space own the given address?
    fn contains(&self, addr: Address) -> bool;

    /// Bytes currently backed by pages from the provider.
    fn committed_bytes(&self) -> usize;

    /// Upper bound this space may grow to.
    fn capacity_bytes(&self) -> usize;
}
