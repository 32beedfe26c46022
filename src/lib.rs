//! flatpage serves a directory of markdown files as a themed website.
//!
//! ```ignore
//! use flatpage::site::{Request, Site};
//!
//! let site = Site::load(None)?;
//! let response = site.handle(&Request::new("/blog/first-post"))?;
//! println!("{}", response.body);
//! ```

pub mod config;
pub mod site;
