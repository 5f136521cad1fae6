//! # Metasys I/O
//!
//! Descriptor composites that are neither files nor sockets:
//!
//! - **pipe**: anonymous pipes with borrowed ends and owning halves
//! - **view**: readable and writable descriptor views, including the
//!   standard streams
//! - **epoll**: epoll interest sets with typed user data

#![warn(missing_docs)]

pub mod epoll;
pub mod pipe;
pub mod view;

pub use epoll::{Epoll, EpollData, EpollEvent, EpollFlags, EpollOp};
pub use pipe::{Pipe, PipeFlags, PipeReader, PipeWriter};
pub use view::{stderr, stdin, stdout, InputView, OutputView};
