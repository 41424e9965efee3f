mod read_bad;
mod write;
