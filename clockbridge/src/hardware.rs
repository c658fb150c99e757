use embassy_rp::peripherals::*;
use embassy_rp::{adc, bind_interrupts, i2c, pio};

// Re-export the resource mapping macro
pub use clockbridge_core::split_resources;

// Bind interrupts to their appropriate interrupt handler
bind_interrupts!(pub struct Irqs {
    PIO0_IRQ_0 => pio::InterruptHandler<PIO0>;
    I2C0_IRQ => i2c::InterruptHandler<I2C0>;
    I2C1_IRQ => i2c::InterruptHandler<I2C1>;
    ADC_IRQ_FIFO => adc::InterruptHandler;
});

split_resources! {
    clock: ClockResources {
        i2c: I2C0,
        scl: PIN_5,
        sda: PIN_4,
        watchdog: WATCHDOG,
    }
    slave: SlaveResources {
        i2c: I2C1,
        scl: PIN_27,
        sda: PIN_26,
    }
    ble: BleResources {
        pwr: PIN_23,
        cs: PIN_25,
        dio: PIN_24,
        clk: PIN_29,
        pio: PIO0,
        dma: DMA_CH0,
        adc: ADC,
        temp_sensor: ADC_TEMP_SENSOR,
    }
    core: CoreResources {
        core1: CORE1,
    }
}
