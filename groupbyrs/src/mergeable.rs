/// Values that fold with an empty identity and an associative merge.
///
/// Issue sets, linkable element sets, and filter resolution lookups are all
/// accumulated this way while walking the resolution DAG.
pub trait Mergeable: Sized {
    fn empty() -> Self;

    fn merge(self, other: Self) -> Self;

    fn merge_iter<I>(items: I) -> Self
    where
        I: IntoIterator<Item = Self>,
    {
        items.into_iter().fold(Self::empty(), Self::merge)
    }
}
