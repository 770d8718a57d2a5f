//! jarsmith-shade - Package relocation for jarsmith archives
//!
//! [`Shader`] moves selected packages of a [`Jar`](jarsmith_archive::Jar)
//! under new prefixes. Class bytes are rewritten through a
//! [`ClassRewriter`]; this crate never parses class files itself.
//!
//! ```no_run
//! use jarsmith_archive::Jar;
//! use jarsmith_core::PatternInstruction;
//! use jarsmith_shade::{ClassRewriter, ShadeRule, ShadeSeed, Shader};
//!
//! # fn run(rewriter: Box<dyn ClassRewriter>) -> jarsmith_core::ArchiveResult<()> {
//! let mut jar = Jar::open("target/app.jar")?;
//! let shader = Shader::new(rewriter, ShadeSeed::Identity)
//!     .rule(ShadeRule::new(PatternInstruction::new("com.google.*")?));
//! let plan = shader.apply(&mut jar)?;
//! println!("{} packages moved", plan.len());
//! # Ok(())
//! # }
//! ```

mod shader;

pub use shader::{ClassRewriter, ShadePlan, ShadeRule, ShadeSeed, Shader, SOURCE_MIRROR};
