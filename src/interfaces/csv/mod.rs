pub mod candidate_reader;
