//! EV dashboard firmware.
//!
//! Three analog sensors (throttle, brake pressure, steering) are sampled by
//! a hardware-timer-triggered ADC sequence; a periodic task publishes the
//! newest readings into a single-slot mailbox and a display task renders
//! them on a character LCD. Sampling is fully decoupled from the tasks: a
//! missed handoff costs staleness, never correctness, and neither task can
//! stall the acquisition.
#![cfg_attr(target_os = "none", no_std)]
#![cfg_attr(target_os = "none", no_main)]

#[cfg(not(target_os = "none"))]
fn main() {}

#[cfg(target_os = "none")]
#[rtic::app(device = tm4c123x, peripherals = true, dispatchers = [SSI2, SSI3])]
mod app {
    use fugit::ExtU32;
    use rtic_monotonics::Monotonic;

    use acq::mailbox::Mailbox;
    use acq::text::fixed_decimal5;
    use evdash::hardware::{
        self,
        adc::SequenceIrq,
        design_parameters::{
            ACQUIRE_PERIOD_MS, DISPLAY_PERIOD_MS, RECEIVE_POLL_MS,
            SENSOR_CHANNELS,
        },
        udma::SgFaultIrq,
        usec_timer::MicroTick,
        Acquisition, DisplayLcd, Systick,
    };

    /// Reading handoff from the acquisition task to the display task.
    /// Capacity one; a send into the occupied slot displaces the old value.
    static READINGS: Mailbox<[u32; SENSOR_CHANNELS]> = Mailbox::new();

    #[shared]
    struct Shared {
        /// All display-bus access is serialized through this resource.
        lcd: DisplayLcd,
    }

    #[local]
    struct Local {
        acquisition: Acquisition,
        adc_irq: Option<SequenceIrq>,
        sg_fault_irq: SgFaultIrq,
        usec_tick: MicroTick,
    }

    #[init]
    fn init(c: init::Context) -> (Shared, Local) {
        let mut devices = hardware::setup::setup(c.core, c.device);

        acquire::spawn().unwrap();
        display::spawn().unwrap();

        // Start sampling last, once everything else is configured. From here
        // the engine runs for the process lifetime.
        if let Some(timer) = devices.sampling_timer.as_mut() {
            timer.start();
        }

        (
            Shared { lcd: devices.lcd },
            Local {
                acquisition: devices.acquisition,
                adc_irq: devices.adc_irq,
                sg_fault_irq: devices.sg_fault_irq,
                usec_tick: devices.usec_tick,
            },
        )
    }

    /// Publish the newest readings at a fixed period.
    #[task(priority = 2, local = [acquisition])]
    async fn acquire(c: acquire::Context) {
        log::info!("acquisition task running");
        loop {
            let readings = c.local.acquisition.read();
            // Non-blocking send: an unconsumed reading is displaced, the
            // consumer only ever wants the newest value.
            READINGS.send(readings);
            Systick::delay(ACQUIRE_PERIOD_MS.millis()).await;
        }
    }

    /// Render the throttle reading at a fixed period.
    #[task(priority = 1, shared = [lcd])]
    async fn display(mut c: display::Context) {
        log::info!("display task running");

        // The panel init handshake needs the microsecond clock, which only
        // ticks with interrupts live; hence init here and not during setup.
        c.shared.lcd.lock(|lcd| {
            if lcd
                .init(false)
                .and_then(|()| lcd.print(b"Throttle"))
                .is_err()
            {
                log::warn!("display init failed");
            }
        });

        loop {
            let mut reading = READINGS.recv();
            if reading.is_none() {
                // Bounded wait for a fresh value, then proceed regardless;
                // an empty slot just means nothing new to render.
                Systick::delay(RECEIVE_POLL_MS.millis()).await;
                reading = READINGS.recv();
            }

            if let Some(values) = reading {
                let text = fixed_decimal5(values[0]);
                c.shared.lcd.lock(|lcd| {
                    if lcd
                        .set_cursor(0, 1)
                        .and_then(|()| lcd.print(&text))
                        .is_err()
                    {
                        log::warn!("display write failed");
                    }
                });
            }

            Systick::delay(DISPLAY_PERIOD_MS.millis()).await;
        }
    }

    /// One interrupt per completed sample sequence: acknowledge and publish.
    #[task(binds = ADC0SS1, priority = 3, local = [adc_irq])]
    fn sequence_complete(c: sequence_complete::Context) {
        if let Some(irq) = c.local.adc_irq.as_mut() {
            irq.on_sequence_complete();
        }
    }

    /// Transfer-controller bus fault: clear, count, carry on.
    #[task(binds = UDMAERR, priority = 3, local = [sg_fault_irq])]
    fn transfer_fault(c: transfer_fault::Context) {
        c.local.sg_fault_irq.on_bus_error();
    }

    /// Microsecond clock tick.
    #[task(binds = TIMER1A, priority = 4, local = [usec_tick])]
    fn usec_tick(c: usec_tick::Context) {
        c.local.usec_tick.on_tick();
    }

    #[idle]
    fn idle(_: idle::Context) -> ! {
        loop {
            cortex_m::asm::wfi();
        }
    }
}
