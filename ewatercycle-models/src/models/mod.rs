pub mod pcrglobwb;
