#[cfg(test)]
mod common;


#[cfg(test)]
mod encoding_test;
