pub mod lending_dtos;
