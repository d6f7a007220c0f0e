pub mod full_art;
