pub mod windy;
