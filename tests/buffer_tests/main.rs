//! Buffer pool tests
