pub mod grants;
pub mod handoff;
pub mod health;
pub mod tokens;

#[cfg(test)]
mod test_support;
