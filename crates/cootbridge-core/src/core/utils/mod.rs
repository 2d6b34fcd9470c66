pub mod guid;
