pub mod device_data;
