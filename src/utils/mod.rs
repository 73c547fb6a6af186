pub mod async_task;

pub mod key_match;

pub mod time;


#[cfg(test)]
mod time_test;
