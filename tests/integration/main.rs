mod api_tests;
mod common;
mod lending_flow;
