/*
** This file is a part of xmpp-session (XMPP client session engine)
** Copyright (C) 2000-2025 Gurer Ozen
**
** xmpp-session is free software: you can redistribute it and/or modify it
** under the terms of the GNU Lesser General Public License as
** published by the Free Software Foundation, either version 3 of
** the License, or (at your option) any later version.
*/

mod entities;
mod parser;
#[cfg(feature = "xmpp")]
mod xmpp;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub use entities::escape;

pub use parser::Location;
pub use parser::SaxElement;
pub use parser::SaxError;
pub use parser::SaxHandler;
pub use parser::SaxParser;

#[cfg(feature = "xmpp")]
pub use xmpp::*;
