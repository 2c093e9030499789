//! Index newtypes for every table the parser builds. Each replaces one of
//! the source compiler's singly linked lists (`locals`, `globals`, the
//! struct-member list, the string-literal list) with an `IdxVec`.

cminic_utils::new_index! {
    /// Indexes a function's `locals` table (includes its parameters).
    pub struct LocalId;
}

cminic_utils::new_index! {
    /// Indexes the program-wide `globals` table.
    pub struct GlobalId;
}

cminic_utils::new_index! {
    /// Indexes the program-wide function table.
    pub struct FuncId;
}

cminic_utils::new_index! {
    /// Indexes the program-wide string-literal table (`.LC<id>` labels).
    pub struct StrId;
}
