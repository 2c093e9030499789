pub trait Idx: 'static + Copy + Eq + PartialEq {
    fn new(idx: usize) -> Self;
    fn idx(&self) -> usize;
    fn incr(&mut self);
    fn incr_by(&mut self, by: usize);
}

/// Declares a newtype wrapping a `usize` and implements [`Idx`] for it.
///
/// This is the standard way every index type in the compiler (`LocalId`,
/// `GlobalId`, `FuncId`, `StrId`, ...) comes into being: a distinct type so
/// that, say, a `GlobalId` can never be used to index a `LocalId` table by
/// accident.
#[macro_export]
macro_rules! new_index {
    ($(#[$attr:meta])* $vis:vis struct $name:ident;) => {
        $(#[$attr])*
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        $vis struct $name(usize);

        impl $crate::idx::Idx for $name {
            #[inline]
            fn new(idx: usize) -> Self {
                $name(idx)
            }

            #[inline]
            fn idx(&self) -> usize {
                self.0
            }

            #[inline]
            fn incr(&mut self) {
                self.0 += 1;
            }

            #[inline]
            fn incr_by(&mut self, by: usize) {
                self.0 += by;
            }
        }

        impl std::fmt::Debug for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, concat!(stringify!($name), "({})"), self.0)
            }
        }
    };
}
