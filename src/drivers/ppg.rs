// FitNode: Analog Pulse Sensor
//
// Oneshot ADC reads of the PPG front end through raw ESP-IDF calls.
// GPIO2 / ADC1_CHANNEL_2 with 11 dB attenuation (0-3.3 V range), 12 bits.

use esp_idf_sys::{
    adc_channel_t, adc_channel_t_ADC_CHANNEL_2, adc_oneshot_unit_handle_t, ESP_OK,
};

use fitnode::error::{NodeError, Result};
use fitnode::hal::PulseSensor;

pub struct PpgSensor {
    handle: adc_oneshot_unit_handle_t,
    channel: adc_channel_t,
}

impl PpgSensor {
    pub fn new() -> anyhow::Result<Self> {
        let channel = adc_channel_t_ADC_CHANNEL_2; // GPIO2
        let mut handle: adc_oneshot_unit_handle_t = core::ptr::null_mut();

        unsafe {
            let unit_cfg = esp_idf_sys::adc_oneshot_unit_init_cfg_t {
                unit_id: esp_idf_sys::adc_unit_t_ADC_UNIT_1,
                ulp_mode: esp_idf_sys::adc_ulp_mode_t_ADC_ULP_MODE_DISABLE,
                ..core::mem::zeroed()
            };
            let ret = esp_idf_sys::adc_oneshot_new_unit(&unit_cfg, &mut handle);
            if ret != ESP_OK {
                anyhow::bail!("ADC unit init failed ({})", ret);
            }

            let chan_cfg = esp_idf_sys::adc_oneshot_chan_cfg_t {
                atten: esp_idf_sys::adc_atten_t_ADC_ATTEN_DB_11,
                bitwidth: esp_idf_sys::adc_bitwidth_t_ADC_BITWIDTH_12,
            };
            let ret = esp_idf_sys::adc_oneshot_config_channel(handle, channel, &chan_cfg);
            if ret != ESP_OK {
                anyhow::bail!("ADC channel config failed ({})", ret);
            }
        }

        log::info!("PPG ADC ready on GPIO{}", fitnode::config::PIN_PPG_ADC);
        Ok(Self { handle, channel })
    }
}

impl PulseSensor for PpgSensor {
    fn read_level(&mut self) -> Result<u16> {
        let mut raw: i32 = 0;
        let ret = unsafe { esp_idf_sys::adc_oneshot_read(self.handle, self.channel, &mut raw) };
        if ret != ESP_OK {
            return Err(NodeError::SensorRead(format!("ADC oneshot read failed ({})", ret)));
        }
        Ok(raw.clamp(0, i32::from(fitnode::config::ADC_MAX)) as u16)
    }
}
