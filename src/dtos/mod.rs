pub mod match_dtos;
