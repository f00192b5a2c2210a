#[cfg(test)]
pub mod fakes;
pub mod usecase;
