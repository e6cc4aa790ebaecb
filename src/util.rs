pub mod cancel;
pub mod object;
pub mod pager;
pub mod poll;
pub mod stream;
